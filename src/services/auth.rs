use std::sync::{Arc, LazyLock};

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;
use crate::repositories::{StoreError, UserStore};

/// タイミング攻撃対策用のダミーハッシュ（プロセス内で一度だけ生成）
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("authgate-dummy-password").ok());

/// パスワードをargon2idでハッシュ化
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
            AppError::Internal(anyhow::anyhow!("password hash error"))
        })?;
    Ok(hash.to_string())
}

/// パスワードを検証
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        tracing::error!(error = ?e, "パスワードハッシュのパースエラー");
        AppError::Internal(anyhow::anyhow!("password hash parse error"))
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// 認証サービス
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
}

impl AuthService {
    /// 新しい AuthService を作成
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// ユーザー登録
    ///
    /// # Security
    /// - パスワードは即座にハッシュ化し、ログに出力しない
    /// - 重複時はどの項目が重複したかを返さない
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AppError> {
        let password_hash = hash_password(password)?;

        let user = self
            .store
            .create_user(username, email, &password_hash)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(constraint) => {
                    tracing::info!(constraint = %constraint, "登録失敗: 既存ユーザー");
                    AppError::UserAlreadyExists
                }
                other => AppError::Store(other),
            })?;

        tracing::info!(user_id = %user.id, "ユーザー登録成功");

        Ok(user)
    }

    /// ユーザー認証を実行
    ///
    /// タイミング攻撃対策: ユーザーが存在しない場合もダミーのパスワード検証を実行
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let user = self.store.find_by_email(email).await?;

        match user {
            Some(user) => {
                if verify_password(password, &user.password_hash)? {
                    tracing::info!(user_id = %user.id, "認証成功");
                    Ok(user)
                } else {
                    tracing::warn!(user_id = %user.id, "認証失敗: パスワード不一致");
                    Err(AppError::Authentication)
                }
            }
            None => {
                if let Some(dummy_hash) = DUMMY_HASH.as_deref() {
                    let _ = verify_password(password, dummy_hash);
                }
                tracing::warn!("認証失敗: ユーザー不在");
                Err(AppError::Authentication)
            }
        }
    }

    /// ユーザーIDでユーザーを取得
    pub async fn find_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)
    }
}
