use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    /// リセットトークンのSHA256ハッシュ（reset_token_expires_at と常に対で設定）
    #[serde(skip)]
    pub reset_token_hash: Option<String>,
    #[serde(skip)]
    pub reset_token_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// `now` 時点で有効なリセットトークンが保留中か
    pub fn has_pending_reset(&self, now: OffsetDateTime) -> bool {
        matches!(
            (&self.reset_token_hash, self.reset_token_expires_at),
            (Some(_), Some(expires_at)) if expires_at > now
        )
    }
}
