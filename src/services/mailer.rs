//! 邮件发送
//!
//! 配置了 SMTP 时使用 lettre 的异步 STARTTLS 传输；否则退化为只写日志的
//! `LogMailer`（开发环境与测试使用，发出的邮件保留在内存中）。

use std::sync::Mutex;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info, warn};

use crate::config::SmtpConfig;
use crate::error::{AppError, AppResult};

const SENDER_NAME: &str = "AI Study Assistant";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> AppResult<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::internal(format!("Invalid SMTP host {}: {}", config.host, e)))?
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .build();
        let from = format!("{} <{}>", SENDER_NAME, config.user)
            .parse::<Mailbox>()
            .map_err(|e| AppError::internal(format!("Invalid sender address: {}", e)))?;
        info!("[Mailer] SMTP relay {}:{}", config.host, config.port);
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()> {
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::validation(format!("Invalid recipient address: {}", e)))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html)
            .map_err(|e| AppError::internal(format!("Failed to build email: {}", e)))?;

        self.transport.send(message).await.map_err(|e| {
            error!("[Mailer] Failed to send '{}': {}", email.subject, e);
            AppError::upstream(format!("Failed to send email: {}", e))
        })?;
        info!("[Mailer] Sent '{}' to {}", email.subject, email.to);
        Ok(())
    }
}

/// 只记录日志的邮件实现
#[derive(Default)]
pub struct LogMailer {
    outbox: Mutex<Vec<OutgoingEmail>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已“发送”的邮件
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()> {
        warn!(
            "[Mailer] SMTP not configured, email to {} not delivered: {}",
            email.to, email.subject
        );
        match self.outbox.lock() {
            Ok(mut outbox) => outbox.push(email),
            Err(poisoned) => poisoned.into_inner().push(email),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_keeps_outbox() {
        let mailer = LogMailer::new();
        mailer
            .send(OutgoingEmail {
                to: "a@example.com".into(),
                subject: "Hello".into(),
                html: "<p>Hi</p>".into(),
            })
            .await
            .expect("send");
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Hello");
    }

    #[tokio::test]
    async fn test_smtp_mailer_builds_from_config() {
        let mailer = SmtpMailer::new(&SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            user: "noreply@example.com".into(),
            pass: "secret".into(),
        });
        assert!(mailer.is_ok());
    }
}
