use axum::{Json, extract::State, http::StatusCode};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::{AppJson, validate_request};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[garde(length(min = 1, max = 64))]
    pub username: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(chars, min = 8))]
    pub password: String, // Deserialize後すぐハッシュ化
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: RegisteredUser,
}

/// ユーザー登録ハンドラー
///
/// POST /auth/register
///
/// # Security
/// - パスワードはログに出力しない
pub async fn register(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    validate_request(&request)?;

    let user = state
        .auth_service
        .register(&request.username, &request.email, &request.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User account created successfully!".to_string(),
            user: RegisteredUser {
                username: user.username,
                email: user.email,
            },
        }),
    ))
}
