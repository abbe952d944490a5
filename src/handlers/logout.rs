use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Serialize;

use crate::middleware::SESSION_COOKIE;

/// ログアウトレスポンス
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// ログアウトハンドラー
///
/// POST /auth/logout
///
/// セッションCookieを削除する。トークン自体は失効まで有効（サーバー側に状態なし）。
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<LogoutResponse>) {
    tracing::info!("ログアウト");

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Json(LogoutResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}
