use axum::{Json, extract::State};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::{AppJson, validate_request};
use crate::middleware::SESSION_COOKIE;
use crate::state::AppState;

/// ログインリクエスト
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// ユーザーのメールアドレス
    #[garde(length(min = 1))]
    pub email: String,
    /// ユーザーのパスワード
    #[garde(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// ログインレスポンス
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: UserSummary,
}

/// ログインハンドラー
///
/// POST /auth/login
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. ユーザー認証（DB照合）
/// 3. セッショントークン発行、HttpOnly Cookie に設定
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    validate_request(&request)?;

    let user = state
        .auth_service
        .authenticate(&request.email, &request.password)
        .await?;

    let token = state.session_service.issue(user.id)?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(state.session_service.ttl())
        .build();

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            message: "Login successful".to_string(),
            user: UserSummary {
                id: user.id,
                username: user.username,
                email: user.email,
            },
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_fields() {
        let request = LoginRequest {
            email: "".to_string(),
            password: "".to_string(),
        };
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn test_validate_valid_request() {
        let request = LoginRequest {
            email: "a@x.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(validate_request(&request).is_ok());
    }
}
