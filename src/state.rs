use std::sync::Arc;

use secrecy::ExposeSecret;
use time::Duration;

use crate::config::Config;
use crate::repositories::UserStore;
use crate::services::{AuthService, Clock, EmailService, PasswordResetService, SessionService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// ユーザーストア
    pub store: Arc<dyn UserStore>,
    /// 認証サービス
    pub auth_service: AuthService,
    /// セッショントークンサービス
    pub session_service: SessionService,
    /// パスワードリセットサービス
    pub password_reset_service: PasswordResetService,
}

impl AppState {
    /// 新しい AppState を作成
    ///
    /// 外部コラボレーター（ストア・メール・時計）は呼び出し側で構築して渡す。
    pub fn new(
        config: Config,
        store: Arc<dyn UserStore>,
        email_service: EmailService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);
        let auth_service = AuthService::new(store.clone());
        let session_service = SessionService::new(
            config.jwt_secret.expose_secret(),
            Duration::seconds(config.session_ttl_secs),
        );
        let password_reset_service = PasswordResetService::new(
            store.clone(),
            email_service,
            clock,
            Duration::seconds(config.password_reset_token_ttl_secs),
        );

        Self {
            config,
            store,
            auth_service,
            session_service,
            password_reset_service,
        }
    }
}
