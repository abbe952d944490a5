//! セッション認証のエクストラクター

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// セッショントークンを保持するCookie名
pub const SESSION_COOKIE: &str = "token";

const BEARER_PREFIX: &str = "Bearer ";

/// 認証済みユーザーID
///
/// Cookie を優先し、なければ `Authorization: Bearer` ヘッダーを参照する。
#[derive(Clone, Copy, Debug)]
pub struct AuthUser(pub Uuid);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or(AppError::MissingSession)?;
        let user_id = state.session_service.validate(&token)?;
        Ok(AuthUser(user_id))
    }
}

fn session_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix(BEARER_PREFIX))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: (&str, &str)) -> Parts {
        let (parts, _) = Request::builder()
            .header(header.0, header.1)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_token_from_cookie() {
        let parts = parts(("cookie", "theme=dark; token=abc.def.ghi"));
        assert_eq!(session_token(&parts).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_token_from_bearer_header() {
        let parts = parts(("authorization", "Bearer abc.def.ghi"));
        assert_eq!(session_token(&parts).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_no_token() {
        let parts = parts(("authorization", "Basic dXNlcjpwYXNz"));
        assert!(session_token(&parts).is_none());
    }
}
