use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{TokenDigest, User};
use crate::repositories::{StoreError, UserStore};

/// インメモリ実装（テスト・ローカル検証用）
///
/// 全操作を単一の Mutex 下で行うため、条件付き更新は比較と書き込みが不可分になる。
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存済みユーザーのスナップショット
    pub fn snapshot(&self, user_id: Uuid) -> Option<User> {
        self.lock().get(&user_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, User>> {
        // ロック保持中にパニックする箇所はないため、poison は無視して中身を使う
        self.users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let mut users = self.lock();
        if users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }
        if users.values().any(|u| u.username == username) {
            return Err(StoreError::Conflict("users_username_key".to_string()));
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock().get(&user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().values().find(|u| u.email == email).cloned())
    }

    async fn find_by_reset_token_digest(
        &self,
        digest: &TokenDigest,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .values()
            .find(|u| {
                u.reset_token_hash.as_deref() == Some(digest.as_str())
                    && u.has_pending_reset(now)
            })
            .cloned())
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        digest: &TokenDigest,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        if let Some(user) = self.lock().get_mut(&user_id) {
            user.reset_token_hash = Some(digest.as_str().to_string());
            user.reset_token_expires_at = Some(expires_at);
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn clear_reset_token_and_set_password(
        &self,
        user_id: Uuid,
        digest: &TokenDigest,
        now: OffsetDateTime,
        new_password_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut users = self.lock();
        let Some(user) = users.get_mut(&user_id) else {
            return Ok(false);
        };

        if user.reset_token_hash.as_deref() != Some(digest.as_str()) || !user.has_pending_reset(now)
        {
            return Ok(false);
        }

        user.password_hash = new_password_hash.to_string();
        user.reset_token_hash = None;
        user.reset_token_expires_at = None;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::models::ResetToken;

    #[tokio::test]
    async fn test_create_user_rejects_duplicates() {
        let store = MemoryUserStore::new();
        store.create_user("alice", "a@x.com", "hash").await.unwrap();

        let dup_email = store.create_user("bob", "a@x.com", "hash").await;
        assert!(matches!(dup_email, Err(StoreError::Conflict(c)) if c == "users_email_key"));

        let dup_name = store.create_user("alice", "b@x.com", "hash").await;
        assert!(matches!(dup_name, Err(StoreError::Conflict(c)) if c == "users_username_key"));
    }

    #[tokio::test]
    async fn test_digest_lookup_excludes_expired() {
        let store = MemoryUserStore::new();
        let user = store.create_user("alice", "a@x.com", "hash").await.unwrap();
        let digest = ResetToken::from_plaintext("tok").digest();
        let now = OffsetDateTime::now_utc();

        store
            .set_reset_token(user.id, &digest, now + Duration::hours(1))
            .await
            .unwrap();

        let found = store.find_by_reset_token_digest(&digest, now).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        let later = now + Duration::hours(1);
        let found = store.find_by_reset_token_digest(&digest, later).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_conditional_clear_succeeds_once() {
        let store = MemoryUserStore::new();
        let user = store.create_user("alice", "a@x.com", "old").await.unwrap();
        let digest = ResetToken::from_plaintext("tok").digest();
        let now = OffsetDateTime::now_utc();
        store
            .set_reset_token(user.id, &digest, now + Duration::hours(1))
            .await
            .unwrap();

        assert!(
            store
                .clear_reset_token_and_set_password(user.id, &digest, now, "new")
                .await
                .unwrap()
        );
        assert!(
            !store
                .clear_reset_token_and_set_password(user.id, &digest, now, "newer")
                .await
                .unwrap()
        );

        let stored = store.snapshot(user.id).unwrap();
        assert_eq!(stored.password_hash, "new");
        assert!(stored.reset_token_hash.is_none());
        assert!(stored.reset_token_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_conditional_clear_rejects_other_digest() {
        let store = MemoryUserStore::new();
        let user = store.create_user("alice", "a@x.com", "old").await.unwrap();
        let now = OffsetDateTime::now_utc();
        store
            .set_reset_token(
                user.id,
                &ResetToken::from_plaintext("tok").digest(),
                now + Duration::hours(1),
            )
            .await
            .unwrap();

        let other = ResetToken::from_plaintext("other").digest();
        assert!(
            !store
                .clear_reset_token_and_set_password(user.id, &other, now, "new")
                .await
                .unwrap()
        );
        assert_eq!(store.snapshot(user.id).unwrap().password_hash, "old");
    }
}
