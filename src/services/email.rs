use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::models::ResetToken;

const RESET_EMAIL_SUBJECT: &str = "Password Reset Request";

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("無効なメールアドレス: {0}")]
    InvalidAddress(String),

    #[error("メールの構築に失敗: {0}")]
    Build(String),

    #[error("メール配送に失敗: {0}")]
    Delivery(String),

    #[error("メール送信がタイムアウト")]
    Timeout,
}

/// 送信するメール
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// メール配送チャネル
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

/// ログ出力のみの送信（開発環境、SMTP未設定時）
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "メール送信（開発モード）");
        // 本文にはリセットリンクが含まれるため debug レベルのみ
        tracing::debug!(body = %email.html_body, "メール本文");
        Ok(())
    }
}

#[cfg(feature = "email")]
pub use smtp::SmtpEmailSender;

#[cfg(feature = "email")]
mod smtp {
    use async_trait::async_trait;
    use lettre::message::{Mailbox, header::ContentType};
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
    use secrecy::ExposeSecret;

    use super::{EmailError, EmailSender, OutgoingEmail};
    use crate::config::Config;

    /// lettre による SMTP 送信
    pub struct SmtpEmailSender {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    }

    impl SmtpEmailSender {
        /// SMTP設定から送信クライアントを構築
        ///
        /// 設定が揃っていない場合は `None`
        pub fn from_config(config: &Config) -> Result<Option<Self>, EmailError> {
            let (Some(host), Some(username), Some(password), Some(from)) = (
                &config.smtp_host,
                &config.smtp_username,
                &config.smtp_password,
                &config.smtp_from_address,
            ) else {
                return Ok(None);
            };

            let from: Mailbox = from
                .parse()
                .map_err(|_| EmailError::InvalidAddress(from.clone()))?;

            let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| EmailError::Build(e.to_string()))?
                .port(config.smtp_port)
                .credentials(Credentials::new(
                    username.expose_secret().clone(),
                    password.expose_secret().clone(),
                ))
                .build();

            Ok(Some(Self { transport, from }))
        }
    }

    #[async_trait]
    impl EmailSender for SmtpEmailSender {
        async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
            let to: Mailbox = email
                .to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(email.to.clone()))?;

            let message = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(email.subject)
                .header(ContentType::TEXT_HTML)
                .body(email.html_body)
                .map_err(|e| EmailError::Build(e.to_string()))?;

            self.transport
                .send(message)
                .await
                .map_err(|e| EmailError::Delivery(e.to_string()))?;

            Ok(())
        }
    }
}

/// メール送信サービス
///
/// 送信チャネルを包み、リセットリンクの組み立てとタイムアウトを担う。
#[derive(Clone)]
pub struct EmailService {
    sender: Arc<dyn EmailSender>,
    reset_url_base: String,
    timeout: Duration,
}

impl EmailService {
    /// 新しい EmailService を作成
    pub fn new(sender: Arc<dyn EmailSender>, reset_url_base: String, timeout: Duration) -> Self {
        Self {
            sender,
            reset_url_base,
            timeout,
        }
    }

    /// 設定に応じた送信チャネルで EmailService を作成
    ///
    /// `email` 機能が有効かつ SMTP 設定が揃っていれば SMTP、それ以外はログ出力のみ。
    pub fn from_config(config: &Config) -> Result<Self, EmailError> {
        let sender: Arc<dyn EmailSender> = Self::select_sender(config)?;
        Ok(Self::new(
            sender,
            config.password_reset_url_base.clone(),
            config.email_timeout(),
        ))
    }

    #[cfg(feature = "email")]
    fn select_sender(config: &Config) -> Result<Arc<dyn EmailSender>, EmailError> {
        match SmtpEmailSender::from_config(config)? {
            Some(sender) => {
                tracing::info!("SMTP メール送信を初期化");
                Ok(Arc::new(sender))
            }
            None => {
                tracing::warn!("SMTP 未設定: メールはログ出力のみ");
                Ok(Arc::new(LogEmailSender))
            }
        }
    }

    #[cfg(not(feature = "email"))]
    fn select_sender(config: &Config) -> Result<Arc<dyn EmailSender>, EmailError> {
        if config.smtp_configured() {
            tracing::warn!("SMTP 設定がありますが email 機能が無効です: メールはログ出力のみ");
        }
        Ok(Arc::new(LogEmailSender))
    }

    /// パスワードリセットメールを送信
    ///
    /// # Security
    /// 平文トークンはリンクにのみ埋め込み、ログには出力しない
    pub async fn send_password_reset_email(
        &self,
        to: &str,
        token: &ResetToken,
        valid_for: time::Duration,
    ) -> Result<(), EmailError> {
        let email = OutgoingEmail {
            to: to.to_string(),
            subject: RESET_EMAIL_SUBJECT.to_string(),
            html_body: reset_email_body(&self.reset_url(token), valid_for),
        };

        match tokio::time::timeout(self.timeout, self.sender.send(email)).await {
            Ok(result) => result,
            Err(_) => Err(EmailError::Timeout),
        }
    }

    /// リセットURLを構築
    fn reset_url(&self, token: &ResetToken) -> String {
        format!(
            "{}/{}",
            self.reset_url_base.trim_end_matches('/'),
            token.expose()
        )
    }
}

fn reset_email_body(reset_link: &str, valid_for: time::Duration) -> String {
    let validity = describe_validity(valid_for);
    format!(
        "<p>We received a request to reset your password.</p>\n\
         <p>Click <a href=\"{reset_link}\">here</a> to reset your password. \
         This link is valid for {validity}.</p>\n\
         <p>If you did not request a password reset, please ignore this email.</p>"
    )
}

/// 割り切れる最大の単位で表記（3600秒 → "1 hour"、90秒 → "90 seconds"）
fn describe_validity(valid_for: time::Duration) -> String {
    let secs = valid_for.whole_seconds().max(0);
    let (amount, unit) = if secs >= 3600 && secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };

    if amount == 1 {
        format!("1 {unit}")
    } else {
        format!("{amount} {unit}s")
    }
}
