use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::repositories::StoreError;
use crate::services::email::EmailError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("認証エラー")]
    Authentication,

    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("無効または期限切れのリセットトークン")]
    InvalidOrExpiredToken,

    #[error("セッションがありません")]
    MissingSession,

    #[error("無効なセッション")]
    InvalidSession,

    #[error("ユーザーは既に存在します")]
    UserAlreadyExists,

    #[error("ユーザーが見つかりません")]
    UserNotFound,

    #[error("ストアエラー: {0}")]
    Store(#[from] StoreError),

    #[error("メール送信エラー: {0}")]
    EmailDelivery(#[from] EmailError),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

/// JSON ボディの解析失敗（欠損フィールド・不正な JSON・Content-Type 不一致）は 400 に揃える
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct ValidationErrorResponse {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(detail) => {
                // バリデーションエラーのみ詳細を返す
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ValidationErrorResponse { message: detail }),
                )
                    .into_response();
            }
            Self::Authentication => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            Self::InvalidOrExpiredToken => (StatusCode::BAD_REQUEST, "Invalid or expired token"),
            Self::MissingSession => (StatusCode::FORBIDDEN, "Authentication required"),
            Self::InvalidSession => (StatusCode::UNAUTHORIZED, "Invalid or expired session"),
            Self::UserAlreadyExists => (StatusCode::CONFLICT, "User already exists"),
            Self::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            Self::Store(e) => {
                tracing::error!(error = ?e, "ストアエラー");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            Self::EmailDelivery(e) => {
                tracing::error!(error = ?e, "メール送信エラー");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to send reset email")
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}
