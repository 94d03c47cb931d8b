use super::orders::{transition, Transition};
use crate::crypto::verify_signature;
use crate::error::{Result, StoreError};
use crate::infra::mailer::send_logged;
use crate::infra::templates;
use crate::metrics::{self, MetricName};
use crate::order_status::OrderStatus;
use crate::state::AppState;
use crate::types::{format_money, NotificationKind, Order};
use serde::Deserialize;
use tracing::{info, warn};

/// Body of the payment provider's confirmation callback.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    pub order_id: String,
    pub payment_reference: String,
    pub amount_cents: i64,
}

/// Verify and apply a signed payment confirmation. Replays of an already
/// applied confirmation return the order unchanged. With no webhook secret
/// configured every confirmation is rejected.
pub async fn confirm_payment(state: &AppState, raw_body: &[u8], signature: Option<&str>) -> Result<Order> {
    let secret = &state.config.payments.webhook_secret;
    let signature = signature.map(str::trim).unwrap_or_default();
    if secret.is_empty() || signature.is_empty() || !verify_signature(secret, raw_body, signature) {
        metrics::increment(MetricName::PaymentsRejected);
        warn!("Rejected payment confirmation with a missing or bad signature");
        return Err(StoreError::Unauthorized);
    }
    let confirmation: PaymentConfirmation = serde_json::from_slice(raw_body)
        .map_err(|e| StoreError::validation(format!("Malformed payment confirmation: {e}")))?;
    let reference = confirmation.payment_reference.trim();
    if reference.is_empty() {
        return Err(StoreError::validation("payment_reference is required"));
    }

    let order = state
        .db
        .get_order(&confirmation.order_id)?
        .ok_or_else(|| StoreError::not_found("Order"))?;
    if confirmation.amount_cents != order.total_cents {
        metrics::increment(MetricName::PaymentsRejected);
        return Err(StoreError::validation(format!(
            "Paid amount {} does not match order total {}",
            format_money(confirmation.amount_cents),
            format_money(order.total_cents)
        )));
    }
    if order.status == OrderStatus::Paid && order.payment_reference.as_deref() == Some(reference) {
        info!("Duplicate payment confirmation for order {}", order.order_number);
        return Ok(order);
    }

    let mut request = Transition::to(OrderStatus::Paid);
    request.payment_reference = Some(reference);
    request.note = Some("Payment confirmed");
    let order = transition(state, &order.id, request).await?;
    metrics::increment(MetricName::PaymentsConfirmed);

    send_logged(state.mailer.as_ref(), &templates::order_confirmation(&order)).await;
    state
        .notifier
        .publish_logged(
            NotificationKind::PaymentReceived,
            format!("Payment received for {}", order.order_number),
            format!("{} paid {}", order.email, format_money(order.total_cents)),
            Some(format!("/admin/orders/{}", order.id)),
        )
        .await;
    Ok(order)
}
