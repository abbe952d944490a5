pub mod health;
pub mod login;
pub mod logout;
pub mod me;
pub mod password_reset;
pub mod register;

use axum::extract::FromRequest;

use crate::error::AppError;

pub use health::health_check;
pub use login::login;
pub use logout::logout;
pub use me::me;
pub use password_reset::{forgot_password, reset_password, verify_reset_token};
pub use register::register;

/// garde によるリクエストバリデーション
pub(crate) fn validate_request<T>(request: &T) -> Result<(), AppError>
where
    T: garde::Validate,
    T::Context: Default,
{
    request
        .validate()
        .map_err(|report| AppError::Validation(report.to_string().trim_end().to_string()))
}

/// `axum::Json` のラッパー。拒否時は `AppError` の `{message}` 形式で返す
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
