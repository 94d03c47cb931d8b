use crate::config::MailConfig;
use crate::error::{Result, StoreError};
use crate::metrics::{self, MetricName};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

/// Send and swallow failures. Email is a side channel: the request that
/// triggered it has already succeeded.
pub async fn send_logged(mailer: &dyn Mailer, email: &Email) -> bool {
    match mailer.send(email).await {
        Ok(()) => {
            metrics::increment(MetricName::EmailsSent);
            true
        }
        Err(e) => {
            metrics::increment(MetricName::EmailsFailed);
            warn!("Failed to send email '{}' to {}: {}", email.subject, email.to, e);
            false
        }
    }
}

/// Posts mail to a transactional email HTTP API.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>, from: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key,
            from: from.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let mut request = self.client.post(&self.api_url).json(&OutgoingMail {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            text: &email.text,
            html: &email.html,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Internal(format!(
                "mail API returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(())
    }
}

/// Writes mail to the log instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        info!(to = %email.to, subject = %email.subject, "Email (not sent, no mail API configured)\n{}", email.text);
        Ok(())
    }
}

pub fn mailer_from_config(config: &MailConfig) -> Result<std::sync::Arc<dyn Mailer>> {
    match config.api_url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => {
            info!("Sending email through {url}");
            Ok(std::sync::Arc::new(HttpMailer::new(
                url,
                config.api_key.clone(),
                config.from.clone(),
            )?))
        }
        None => {
            info!("No mail API configured, emails will be logged");
            Ok(std::sync::Arc::new(LogMailer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: &Email) -> Result<()> {
            Err(StoreError::Internal("smtp down".into()))
        }
    }

    #[derive(Default)]
    struct Capture(Mutex<Vec<Email>>);

    #[async_trait]
    impl Mailer for Capture {
        async fn send(&self, email: &Email) -> Result<()> {
            self.0.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn sample() -> Email {
        Email {
            to: "a@example.com".into(),
            subject: "Hi".into(),
            text: "Hello".into(),
            html: "<p>Hello</p>".into(),
        }
    }

    #[tokio::test]
    async fn test_send_logged_swallows_failures() {
        assert!(!send_logged(&FailingMailer, &sample()).await);
    }

    #[tokio::test]
    async fn test_send_logged_delivers() {
        let capture = Capture::default();
        assert!(send_logged(&capture, &sample()).await);
        assert_eq!(capture.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_config_without_url_uses_log_mailer() {
        let config = MailConfig::default();
        assert!(mailer_from_config(&config).is_ok());
    }
}
