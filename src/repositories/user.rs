use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{TokenDigest, User};
use crate::repositories::{StoreError, UserStore};

const USER_COLUMNS: &str = "id, username, email, password_hash, reset_token_hash, \
     reset_token_expires_at, created_at, updated_at";

/// PostgreSQL 実装
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// クエリにタイムアウトを適用
    async fn bounded<T, F>(&self, query: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, query).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "DBクエリがタイムアウト");
                Err(StoreError::Timeout)
            }
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(sqlx::query("SELECT 1").execute(&self.pool))
            .await?;
        Ok(())
    }

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        let result = self
            .bounded(
                sqlx::query_as::<_, User>(&sql)
                    .bind(Uuid::new_v4())
                    .bind(username)
                    .bind(email)
                    .bind(password_hash)
                    .fetch_one(&self.pool),
            )
            .await;

        match result {
            Err(StoreError::Database(sqlx::Error::Database(db_err)))
                if db_err.is_unique_violation() =>
            {
                Err(StoreError::Conflict(
                    db_err.constraint().unwrap_or("users").to_string(),
                ))
            }
            other => other,
        }
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.bounded(
            sqlx::query_as::<_, User>(&sql)
                .bind(user_id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        self.bounded(
            sqlx::query_as::<_, User>(&sql)
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_by_reset_token_digest(
        &self,
        digest: &TokenDigest,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE reset_token_hash = $1 AND reset_token_expires_at > $2
            "#
        );
        self.bounded(
            sqlx::query_as::<_, User>(&sql)
                .bind(digest.as_str())
                .bind(now)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        digest: &TokenDigest,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        self.bounded(
            sqlx::query(
                r#"
                UPDATE users
                SET reset_token_hash = $2, reset_token_expires_at = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(user_id)
            .bind(digest.as_str())
            .bind(expires_at)
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn clear_reset_token_and_set_password(
        &self,
        user_id: Uuid,
        digest: &TokenDigest,
        now: OffsetDateTime,
        new_password_hash: &str,
    ) -> Result<bool, StoreError> {
        // 条件付きUPDATE: 同一トークンでの並行リセットは1件のみ成功する
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE users
                    SET password_hash = $4,
                        reset_token_hash = NULL,
                        reset_token_expires_at = NULL,
                        updated_at = NOW()
                    WHERE id = $1
                      AND reset_token_hash = $2
                      AND reset_token_expires_at > $3
                    "#,
                )
                .bind(user_id)
                .bind(digest.as_str())
                .bind(now)
                .bind(new_password_hash)
                .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
