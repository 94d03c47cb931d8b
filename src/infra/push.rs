use crate::config::PushConfig;
use crate::error::{Result, StoreError};
use crate::types::Notification;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Forwards admin notifications to an external pub/sub service.
#[async_trait]
pub trait PushPublisher: Send + Sync {
    async fn publish(&self, notification: &Notification) -> Result<()>;
}

#[derive(Serialize)]
struct PushMessage<'a> {
    channel: &'a str,
    event: &'a str,
    data: &'a Notification,
}

pub struct HttpPushPublisher {
    client: reqwest::Client,
    url: String,
    key: Option<String>,
    channel: String,
}

impl HttpPushPublisher {
    pub fn new(url: impl Into<String>, key: Option<String>, channel: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            key,
            channel: channel.into(),
        })
    }
}

#[async_trait]
impl PushPublisher for HttpPushPublisher {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        let mut request = self.client.post(&self.url).json(&PushMessage {
            channel: &self.channel,
            event: notification.kind.as_str(),
            data: notification,
        });
        if let Some(key) = &self.key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(StoreError::Internal(format!(
                "push service returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

pub struct NoopPushPublisher;

#[async_trait]
impl PushPublisher for NoopPushPublisher {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        debug!("Push disabled, dropping {} notification", notification.kind.as_str());
        Ok(())
    }
}

pub fn push_from_config(config: &PushConfig) -> Result<Arc<dyn PushPublisher>> {
    match config.url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => {
            info!("Forwarding admin notifications to {url}");
            Ok(Arc::new(HttpPushPublisher::new(
                url,
                config.key.clone(),
                config.channel.clone(),
            )?))
        }
        None => Ok(Arc::new(NoopPushPublisher)),
    }
}
