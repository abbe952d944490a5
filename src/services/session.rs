use std::sync::Arc;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::AppError;

/// セッショントークンのクレーム
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// ユーザーID
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// セッショントークン（HS256 JWT）の発行と検証
#[derive(Clone)]
pub struct SessionService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    ttl: Duration,
}

impl SessionService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            ttl,
        }
    }

    /// セッションの有効期間
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// ユーザーIDに対するトークンを発行
    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = ?e, "セッショントークン生成エラー");
            AppError::Internal(anyhow::anyhow!("session token encode error"))
        })
    }

    /// トークンを検証しユーザーIDを返す
    pub fn validate(&self, token: &str) -> Result<Uuid, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default()).map_err(
            |e| {
                tracing::debug!(error = %e, "セッショントークン検証失敗");
                AppError::InvalidSession
            },
        )?;

        Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::InvalidSession)
    }
}
