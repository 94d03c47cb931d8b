use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::infra::mailer::{mailer_from_config, Mailer};
use crate::infra::push::{push_from_config, PushPublisher};
use crate::infra::uploads::ImageStore;
use crate::notify::NotificationHub;
use crate::rate_limiter::SlidingWindowLimiter;
use std::sync::Arc;

/// Shared by every handler and use case.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
    pub notifier: NotificationHub,
    pub uploads: Arc<ImageStore>,
    pub api_limiter: Arc<SlidingWindowLimiter>,
    pub auth_limiter: Arc<SlidingWindowLimiter>,
}

impl AppState {
    /// Wire the side channels from configuration.
    pub fn from_config(db: Database, config: Config) -> Result<Self> {
        let mailer = mailer_from_config(&config.mail)?;
        let push = push_from_config(&config.push)?;
        Ok(Self::with_services(db, config, mailer, push))
    }

    pub fn with_services(
        db: Database,
        config: Config,
        mailer: Arc<dyn Mailer>,
        push: Arc<dyn PushPublisher>,
    ) -> Self {
        let db = Arc::new(db);
        Self {
            notifier: NotificationHub::new(db.clone(), push),
            uploads: Arc::new(ImageStore::new(&config.uploads.dir, config.uploads.max_bytes)),
            api_limiter: Arc::new(SlidingWindowLimiter::from_config(&config.rate_limit.api)),
            auth_limiter: Arc::new(SlidingWindowLimiter::from_config(&config.rate_limit.auth)),
            db,
            config: Arc::new(config),
            mailer,
        }
    }
}
