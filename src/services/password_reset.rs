use std::sync::Arc;

use time::Duration;

use crate::error::AppError;
use crate::models::ResetToken;
use crate::repositories::UserStore;
use crate::services::{Clock, EmailService, auth::hash_password};

/// パスワードリセットサービス
///
/// ユーザーごとに保留中のリセットトークンは高々1つ。
/// 期限切れトークンは検索対象から外れるだけで、削除はしない。
#[derive(Clone)]
pub struct PasswordResetService {
    store: Arc<dyn UserStore>,
    email_service: EmailService,
    clock: Arc<dyn Clock>,
    token_ttl: Duration,
}

impl PasswordResetService {
    /// 新しい PasswordResetService を作成
    pub fn new(
        store: Arc<dyn UserStore>,
        email_service: EmailService,
        clock: Arc<dyn Clock>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            email_service,
            clock,
            token_ttl,
        }
    }

    /// パスワードリセットをリクエスト
    ///
    /// # Security
    /// - ユーザーが存在しない場合も常に成功を返す（情報漏洩防止）
    /// - トークン（平文）はログに出力しない
    pub async fn request_reset(&self, email: &str) -> Result<(), AppError> {
        let Some(user) = self.store.find_by_email(email).await? else {
            tracing::info!("パスワードリセット: ユーザー不在（成功レスポンス返却）");
            return Ok(());
        };

        let token = ResetToken::generate();
        let expires_at = self.clock.now() + self.token_ttl;

        // 既存の保留中トークンは上書きされ、即座に無効になる
        self.store
            .set_reset_token(user.id, &token.digest(), expires_at)
            .await?;

        self.email_service
            .send_password_reset_email(&user.email, &token, self.token_ttl)
            .await
            .inspect_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "パスワードリセットメール送信失敗");
            })?;

        tracing::info!(user_id = %user.id, "パスワードリセットメール送信完了");

        Ok(())
    }

    /// トークンが有効か確認（状態は変更しない）
    ///
    /// 不一致と期限切れは区別しない
    pub async fn verify_token(&self, token: &str) -> Result<bool, AppError> {
        let digest = ResetToken::from_plaintext(token).digest();
        let user = self
            .store
            .find_by_reset_token_digest(&digest, self.clock.now())
            .await?;

        Ok(user.is_some())
    }

    /// パスワードをリセット
    ///
    /// # Security
    /// - トークン・新パスワードはログに出力しない
    /// - 更新は条件付き書き込み1回で行い、同一トークンの並行リセットは1件のみ成功
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let digest = ResetToken::from_plaintext(token).digest();

        let user = self
            .store
            .find_by_reset_token_digest(&digest, self.clock.now())
            .await?
            .ok_or_else(|| {
                tracing::warn!("無効または期限切れのリセットトークン");
                AppError::InvalidOrExpiredToken
            })?;

        let password_hash = hash_password(new_password)?;

        let applied = self
            .store
            .clear_reset_token_and_set_password(
                user.id,
                &digest,
                self.clock.now(),
                &password_hash,
            )
            .await?;

        if !applied {
            // 検索後に別リクエストが消費した、または失効した
            tracing::warn!(user_id = %user.id, "リセットトークンは既に消費済みまたは期限切れ");
            return Err(AppError::InvalidOrExpiredToken);
        }

        tracing::info!(user_id = %user.id, "パスワードリセット完了");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::OffsetDateTime;

    use super::*;
    use crate::models::User;
    use crate::repositories::MemoryUserStore;
    use crate::services::auth::verify_password;
    use crate::services::clock::ManualClock;
    use crate::services::email::{EmailError, EmailSender, OutgoingEmail};

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    impl RecordingSender {
        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        /// 最後に送信されたリンクからトークンを取り出す
        fn last_token(&self) -> String {
            let sent = self.sent.lock().unwrap();
            let body = &sent.last().expect("no email sent").html_body;
            let start = body.find(RESET_BASE).expect("no reset link") + RESET_BASE.len() + 1;
            let end = start + body[start..].find('"').expect("unterminated link");
            body[start..end].to_string()
        }
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
            self.sent.lock().unwrap().push(email);
            Ok(())
        }
    }

    struct FailingSender;

    #[async_trait]
    impl EmailSender for FailingSender {
        async fn send(&self, _email: OutgoingEmail) -> Result<(), EmailError> {
            Err(EmailError::Delivery("smtp down".to_string()))
        }
    }

    const RESET_BASE: &str = "http://localhost:5173/reset-password";

    struct Fixture {
        store: Arc<MemoryUserStore>,
        sender: Arc<RecordingSender>,
        clock: Arc<ManualClock>,
        service: PasswordResetService,
        user: User,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryUserStore::new());
        let sender = Arc::new(RecordingSender::default());
        let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
        let email_service = EmailService::new(
            sender.clone(),
            RESET_BASE.to_string(),
            std::time::Duration::from_secs(1),
        );
        let service = PasswordResetService::new(
            store.clone(),
            email_service,
            clock.clone(),
            Duration::hours(1),
        );
        let hash = hash_password("OldPass123!").unwrap();
        let user = store.create_user("alice", "a@x.com", &hash).await.unwrap();

        Fixture {
            store,
            sender,
            clock,
            service,
            user,
        }
    }

    #[tokio::test]
    async fn test_unknown_email_is_silent_success() {
        let f = fixture().await;
        let before = f.store.snapshot(f.user.id).unwrap();

        f.service.request_reset("nobody@x.com").await.unwrap();

        assert_eq!(f.sender.count(), 0);
        let after = f.store.snapshot(f.user.id).unwrap();
        assert_eq!(after.reset_token_hash, before.reset_token_hash);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn test_request_stores_digest_not_plaintext() {
        let f = fixture().await;
        f.service.request_reset("a@x.com").await.unwrap();

        let token = f.sender.last_token();
        let stored = f.store.snapshot(f.user.id).unwrap();
        let expected = ResetToken::from_plaintext(token.clone()).digest();
        assert_eq!(stored.reset_token_hash.as_deref(), Some(expected.as_str()));
        assert_ne!(stored.reset_token_hash.as_deref(), Some(token.as_str()));
        assert_eq!(
            stored.reset_token_expires_at,
            Some(f.clock.now() + Duration::hours(1))
        );
    }

    #[tokio::test]
    async fn test_verify_token_is_read_only() {
        let f = fixture().await;
        f.service.request_reset("a@x.com").await.unwrap();
        let token = f.sender.last_token();
        let before = f.store.snapshot(f.user.id).unwrap();

        assert!(f.service.verify_token(&token).await.unwrap());
        assert!(f.service.verify_token(&token).await.unwrap());
        assert!(!f.service.verify_token("wrong-token").await.unwrap());

        let after = f.store.snapshot(f.user.id).unwrap();
        assert_eq!(after.reset_token_hash, before.reset_token_hash);
        assert_eq!(after.password_hash, before.password_hash);
    }

    #[tokio::test]
    async fn test_token_expires_after_one_hour() {
        let f = fixture().await;
        f.service.request_reset("a@x.com").await.unwrap();
        let token = f.sender.last_token();

        f.clock.advance(Duration::minutes(59));
        assert!(f.service.verify_token(&token).await.unwrap());

        f.clock.advance(Duration::minutes(1));
        assert!(!f.service.verify_token(&token).await.unwrap());

        let result = f.service.reset_password(&token, "NewPass123!").await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));

        let stored = f.store.snapshot(f.user.id).unwrap();
        assert!(verify_password("OldPass123!", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_reset_succeeds_once() {
        let f = fixture().await;
        f.service.request_reset("a@x.com").await.unwrap();
        let token = f.sender.last_token();

        f.service.reset_password(&token, "NewPass123!").await.unwrap();

        let stored = f.store.snapshot(f.user.id).unwrap();
        assert!(verify_password("NewPass123!", &stored.password_hash).unwrap());
        assert!(stored.reset_token_hash.is_none());
        assert!(stored.reset_token_expires_at.is_none());

        let again = f.service.reset_password(&token, "Another123!").await;
        assert!(matches!(again, Err(AppError::InvalidOrExpiredToken)));
        assert!(!f.service.verify_token(&token).await.unwrap());
    }

    #[tokio::test]
    async fn test_second_request_invalidates_first_token() {
        let f = fixture().await;
        f.service.request_reset("a@x.com").await.unwrap();
        let tok1 = f.sender.last_token();
        f.service.request_reset("a@x.com").await.unwrap();
        let tok2 = f.sender.last_token();
        assert_ne!(tok1, tok2);

        let first = f.service.reset_password(&tok1, "NewPass123!").await;
        assert!(matches!(first, Err(AppError::InvalidOrExpiredToken)));

        f.service.reset_password(&tok2, "NewPass123!").await.unwrap();
        let stored = f.store.snapshot(f.user.id).unwrap();
        assert!(verify_password("NewPass123!", &stored.password_hash).unwrap());
        assert!(!verify_password("OldPass123!", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_non_matching_token_does_not_mutate() {
        let f = fixture().await;
        f.service.request_reset("a@x.com").await.unwrap();
        let before = f.store.snapshot(f.user.id).unwrap();

        let forged = ResetToken::generate();
        let result = f.service.reset_password(forged.expose(), "NewPass123!").await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));

        let after = f.store.snapshot(f.user.id).unwrap();
        assert_eq!(after.password_hash, before.password_hash);
        assert_eq!(after.reset_token_hash, before.reset_token_hash);
        assert_eq!(after.reset_token_expires_at, before.reset_token_expires_at);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_resets_have_single_winner() {
        let f = fixture().await;
        f.service.request_reset("a@x.com").await.unwrap();
        let token = f.sender.last_token();

        let (a, b) = tokio::join!(
            f.service.reset_password(&token, "FirstPass123!"),
            f.service.reset_password(&token, "SecondPass123!"),
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser, Err(AppError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_email_failure_is_surfaced() {
        let store = Arc::new(MemoryUserStore::new());
        store.create_user("alice", "a@x.com", "hash").await.unwrap();
        let service = PasswordResetService::new(
            store,
            EmailService::new(
                Arc::new(FailingSender),
                RESET_BASE.to_string(),
                std::time::Duration::from_secs(1),
            ),
            Arc::new(ManualClock::new(OffsetDateTime::now_utc())),
            Duration::hours(1),
        );

        let result = service.request_reset("a@x.com").await;
        assert!(matches!(result, Err(AppError::EmailDelivery(_))));

        // 存在しないアカウントではメール送信自体が行われない
        assert!(service.request_reset("nobody@x.com").await.is_ok());
    }
}
