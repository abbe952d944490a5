use axum::{Json, extract::State};
use serde::Serialize;

use crate::error::AppError;
use crate::handlers::login::UserSummary;
use crate::middleware::AuthUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserSummary,
}

/// ログイン中ユーザーのプロフィール
///
/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let user = state.auth_service.find_user(user_id).await?;

    Ok(Json(MeResponse {
        user: UserSummary {
            id: user.id,
            username: user.username,
            email: user.email,
        },
    }))
}
