pub mod memory;
pub mod user;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{TokenDigest, User};

pub use memory::MemoryUserStore;
pub use user::PgUserStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("データベースエラー: {0}")]
    Database(#[from] sqlx::Error),

    #[error("一意制約違反: {0}")]
    Conflict(String),

    #[error("ストア呼び出しがタイムアウト")]
    Timeout,
}

/// ユーザーレコードの永続化
///
/// リセット関連フィールド（トークンハッシュと有効期限）は常に対で書き込み・消去する。
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 疎通確認
    async fn ping(&self) -> Result<(), StoreError>;

    /// 新しいユーザーを作成
    ///
    /// # Errors
    /// email / username の一意制約違反時は `StoreError::Conflict`
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// トークンハッシュが一致し、かつ `now` より後に失効するユーザーを検索
    async fn find_by_reset_token_digest(
        &self,
        digest: &TokenDigest,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;

    /// リセットトークンを設定（保留中のトークンは上書き）
    async fn set_reset_token(
        &self,
        user_id: Uuid,
        digest: &TokenDigest,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// パスワードを更新し、リセットトークンを消去する（単一の条件付き書き込み）
    ///
    /// 保存済みハッシュが `digest` と一致し、かつ `now` 時点で未失効の場合のみ適用。
    /// 適用された場合に `true` を返す。
    async fn clear_reset_token_and_set_password(
        &self,
        user_id: Uuid,
        digest: &TokenDigest,
        now: OffsetDateTime,
        new_password_hash: &str,
    ) -> Result<bool, StoreError>;
}
