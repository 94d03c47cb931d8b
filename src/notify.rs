//! Admin notification fan-out: persisted, broadcast in-process for the SSE
//! stream, and forwarded to the external push service.

use crate::db::{new_id, Database};
use crate::error::Result;
use crate::infra::push::PushPublisher;
use crate::metrics::{self, MetricName};
use crate::types::{Notification, NotificationKind};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct NotificationHub {
    db: Arc<Database>,
    sender: broadcast::Sender<Notification>,
    push: Arc<dyn PushPublisher>,
}

impl NotificationHub {
    pub fn new(db: Arc<Database>, push: Arc<dyn PushPublisher>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { db, sender, push }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Persisting is the only step that can fail the caller. Broadcast and
    /// push failures are logged.
    pub async fn publish(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        link: Option<String>,
    ) -> Result<Notification> {
        let notification = Notification {
            id: new_id(),
            kind,
            title: title.into(),
            body: body.into(),
            link,
            created_at: Utc::now(),
            read_at: None,
        };
        self.db.insert_notification(&notification)?;
        metrics::increment_labeled(
            MetricName::NotificationsPublished,
            "kind",
            kind.as_str().to_string(),
        );

        // No receivers is normal when no admin has the stream open.
        if let Ok(receivers) = self.sender.send(notification.clone()) {
            debug!("Notification {} delivered to {} stream(s)", notification.id, receivers);
        }

        match self.push.publish(&notification).await {
            Ok(()) => metrics::increment(MetricName::PushPublished),
            Err(e) => {
                metrics::increment(MetricName::PushFailed);
                warn!("Failed to push {} notification: {}", kind.as_str(), e);
            }
        }
        Ok(notification)
    }

    /// Publish and log instead of failing. Used after the main write has committed.
    pub async fn publish_logged(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        link: Option<String>,
    ) {
        if let Err(e) = self.publish(kind, title, body, link).await {
            warn!("Failed to record {} notification: {}", kind.as_str(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::infra::push::NoopPushPublisher;
    use crate::types::PageRequest;
    use async_trait::async_trait;

    struct BrokenPush;

    #[async_trait]
    impl PushPublisher for BrokenPush {
        async fn publish(&self, _notification: &Notification) -> Result<()> {
            Err(StoreError::Internal("push down".into()))
        }
    }

    #[tokio::test]
    async fn test_publish_persists_and_broadcasts() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let hub = NotificationHub::new(db.clone(), Arc::new(NoopPushPublisher));
        let mut rx = hub.subscribe();

        let sent = hub
            .publish(NotificationKind::LowStock, "Low stock", "Curl Cream has 2 left", None)
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, sent.id);
        let (stored, total) = db.list_notifications(true, PageRequest::default()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(stored[0].kind, NotificationKind::LowStock);
    }

    #[tokio::test]
    async fn test_push_failure_is_not_propagated() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let hub = NotificationHub::new(db, Arc::new(BrokenPush));
        let result = hub
            .publish(NotificationKind::OrderCreated, "New order", "HC-1", None)
            .await;
        assert!(result.is_ok());
    }
}
