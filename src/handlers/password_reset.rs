use axum::{
    Json,
    extract::{Path, State},
};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::{AppJson, validate_request};
use crate::state::AppState;

const FORGOT_PASSWORD_MESSAGE: &str =
    "If this email exists in our system, you will receive a reset link";

// === リセットリクエスト ===

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[garde(length(min = 1))]
    pub email: String,
}

impl ForgotPasswordRequest {
    /// 前後の空白を除去（空白のみの入力は空として検証される）
    fn normalized(self) -> Self {
        Self {
            email: self.email.trim().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /auth/forgot-password
///
/// # Security
/// 常に同じレスポンスを返す（ユーザー存在有無を漏洩しない）
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(request): AppJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let request = request.normalized();
    validate_request(&request)?;

    state
        .password_reset_service
        .request_reset(&request.email)
        .await?;

    Ok(Json(MessageResponse {
        message: FORGOT_PASSWORD_MESSAGE.to_string(),
    }))
}

// === トークン確認 ===

#[derive(Debug, Serialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    pub message: String,
}

/// GET /auth/verify-reset-token/{token}
///
/// 状態は変更しない。不一致と期限切れは同じレスポンス。
pub async fn verify_reset_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<VerifyTokenResponse>, AppError> {
    let valid = state.password_reset_service.verify_token(&token).await?;

    let message = if valid {
        "Valid token"
    } else {
        "Invalid or expired token"
    };

    Ok(Json(VerifyTokenResponse {
        valid,
        message: message.to_string(),
    }))
}

// === パスワードリセット実行 ===

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[garde(length(chars, min = 8))]
    pub password: String,
}

/// POST /auth/reset-password/{token}
///
/// # Security
/// - token, password はログに出力しない
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    AppJson(request): AppJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if token.trim().is_empty() {
        return Err(AppError::Validation("Token is required".to_string()));
    }
    validate_request(&request)?;

    state
        .password_reset_service
        .reset_password(&token, &request.password)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password reset successfully".to_string(),
    }))
}
