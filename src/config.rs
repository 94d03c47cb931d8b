use crate::error::{Result, StoreError};
use serde::Deserialize;
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub shop: ShopConfig,
    pub rate_limit: RateLimitConfig,
    pub payments: PaymentsConfig,
    pub mail: MailConfig,
    pub push: PushConfig,
    pub uploads: UploadsConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Base URL used when building links in outgoing emails.
    pub public_url: String,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_ttl_days: i64,
    pub password_iterations: u32,
    pub cookie_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    pub currency: String,
    pub flat_shipping_cents: i64,
    pub free_shipping_threshold_cents: i64,
    /// Tax rate in basis points (800 = 8%).
    pub tax_rate_bps: i64,
    pub low_stock_threshold: i64,
    pub max_cart_quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub api: WindowConfig,
    pub auth: WindowConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WindowConfig {
    pub limit: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PaymentsConfig {
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub from: String,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub url: Option<String>,
    pub key: Option<String>,
    pub channel: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    pub dir: String,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            public_url: "http://localhost:8080".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/tresses.db".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_days: 30,
            password_iterations: 100_000,
            cookie_name: "tresses_session".to_string(),
        }
    }
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            flat_shipping_cents: 599,
            free_shipping_threshold_cents: 5000,
            tax_rate_bps: 800,
            low_stock_threshold: 5,
            max_cart_quantity: 10,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            api: WindowConfig {
                limit: 120,
                window_secs: 60,
            },
            auth: WindowConfig {
                limit: 10,
                window_secs: 60,
            },
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "Tresses <orders@tresses.local>".to_string(),
            api_url: None,
            api_key: None,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            channel: "admin".to_string(),
        }
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { port: 9898 }
    }
}

impl Config {
    /// Load `config.toml` (or the given path), then apply environment overrides.
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                StoreError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_toml(&content)?
        } else {
            info!("{} not found, using defaults", path.display());
            Config::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StoreError::Config(format!("Invalid config: {e}")))
    }

    fn apply_env(&mut self) {
        override_parsed("TRESSES_PORT", &mut self.server.port);
        override_string("TRESSES_PUBLIC_URL", &mut self.server.public_url);
        override_string("TRESSES_DATABASE_PATH", &mut self.database.path);
        override_string("TRESSES_UPLOAD_DIR", &mut self.uploads.dir);
        override_string("TRESSES_PAYMENT_SECRET", &mut self.payments.webhook_secret);
        override_string("TRESSES_MAIL_FROM", &mut self.mail.from);
        override_optional("TRESSES_MAIL_API_URL", &mut self.mail.api_url);
        override_optional("TRESSES_MAIL_API_KEY", &mut self.mail.api_key);
        override_optional("TRESSES_PUSH_URL", &mut self.push.url);
        override_optional("TRESSES_PUSH_KEY", &mut self.push.key);
        override_parsed("TRESSES_METRICS_PORT", &mut self.metrics.port);
    }

    pub fn validate(&self) -> Result<()> {
        if self.shop.tax_rate_bps < 0 || self.shop.tax_rate_bps > 10_000 {
            return Err(StoreError::Config(
                "shop.tax_rate_bps must be between 0 and 10000".into(),
            ));
        }
        if self.shop.max_cart_quantity < 1 {
            return Err(StoreError::Config(
                "shop.max_cart_quantity must be at least 1".into(),
            ));
        }
        if self.auth.password_iterations == 0 {
            return Err(StoreError::Config(
                "auth.password_iterations must be positive".into(),
            ));
        }
        for window in [&self.rate_limit.api, &self.rate_limit.auth] {
            if window.limit == 0 || window.window_secs == 0 {
                return Err(StoreError::Config(
                    "rate limit windows need a positive limit and duration".into(),
                ));
            }
        }
        if self.payments.webhook_secret.is_empty() {
            warn!("payments.webhook_secret is empty; payment confirmations will be rejected");
        }
        Ok(())
    }
}

fn override_string(key: &str, target: &mut String) {
    if let Ok(value) = env::var(key) {
        info!("{key} set from environment");
        *target = value;
    }
}

fn override_optional(key: &str, target: &mut Option<String>) {
    if let Ok(value) = env::var(key) {
        *target = if value.is_empty() { None } else { Some(value) };
    }
}

fn override_parsed<T: FromStr>(key: &str, target: &mut T)
where
    T::Err: Display,
{
    if let Ok(raw) = env::var(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(e) => warn!("Invalid {key} value '{raw}': {e}, keeping configured value"),
        }
    }
}
