//! Storefront metrics, exported in Prometheus format.

use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Every metric the service records. Keeps names in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    UsersRegistered,
    LoginsSuccess,
    LoginsFailed,
    OrdersCreated,
    OrderRevenueCents,
    PaymentsConfirmed,
    PaymentsRejected,
    OrderTransitions,
    EmailsSent,
    EmailsFailed,
    PushPublished,
    PushFailed,
    NotificationsPublished,
    RateLimited,
    UploadsStored,
    UploadBytes,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricName::UsersRegistered => "tresses_users_registered_total",
            MetricName::LoginsSuccess => "tresses_logins_success_total",
            MetricName::LoginsFailed => "tresses_logins_failed_total",
            MetricName::OrdersCreated => "tresses_orders_created_total",
            MetricName::OrderRevenueCents => "tresses_order_revenue_cents",
            MetricName::PaymentsConfirmed => "tresses_payments_confirmed_total",
            MetricName::PaymentsRejected => "tresses_payments_rejected_total",
            MetricName::OrderTransitions => "tresses_order_transitions_total",
            MetricName::EmailsSent => "tresses_emails_sent_total",
            MetricName::EmailsFailed => "tresses_emails_failed_total",
            MetricName::PushPublished => "tresses_push_published_total",
            MetricName::PushFailed => "tresses_push_failed_total",
            MetricName::NotificationsPublished => "tresses_notifications_published_total",
            MetricName::RateLimited => "tresses_rate_limited_total",
            MetricName::UploadsStored => "tresses_uploads_stored_total",
            MetricName::UploadBytes => "tresses_upload_bytes",
        };
        write!(f, "{}", name)
    }
}

pub fn increment(name: MetricName) {
    metrics::counter!(name.to_string()).increment(1);
}

pub fn increment_labeled(name: MetricName, label: &'static str, value: String) {
    metrics::counter!(name.to_string(), label => value).increment(1);
}

pub fn record(name: MetricName, value: f64) {
    metrics::histogram!(name.to_string()).record(value);
}

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => warn!("Prometheus exporter install failed (possibly already installed): {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            MetricName::OrdersCreated,
            MetricName::RateLimited,
            MetricName::EmailsFailed,
        ] {
            assert!(name.to_string().starts_with("tresses_"));
        }
        assert_eq!(
            MetricName::PaymentsConfirmed.to_string(),
            "tresses_payments_confirmed_total"
        );
    }
}
