use crate::db::orders::{OrderFilter, StatusChange};
use crate::error::{Result, StoreError};
use crate::infra::mailer::send_logged;
use crate::infra::templates;
use crate::metrics::{self, MetricName};
use crate::order_status::OrderStatus;
use crate::state::AppState;
use crate::types::{format_money, Order, OrderDetail, Page, PageRequest, NotificationKind, User};
use tracing::info;

/// A requested move through the order state machine.
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    pub to: OrderStatus,
    pub actor_id: Option<&'a str>,
    pub note: Option<&'a str>,
    pub tracking_number: Option<&'a str>,
    pub payment_reference: Option<&'a str>,
}

impl<'a> Transition<'a> {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            to: status,
            actor_id: None,
            note: None,
            tracking_number: None,
            payment_reference: None,
        }
    }

    pub fn by(mut self, actor_id: &'a str) -> Self {
        self.actor_id = Some(actor_id);
        self
    }
}

/// Validate and apply a status change, then tell the customer and admins.
/// Every status change in the system goes through here.
pub async fn transition(state: &AppState, order_id: &str, request: Transition<'_>) -> Result<Order> {
    let order = state
        .db
        .get_order(order_id)?
        .ok_or_else(|| StoreError::not_found("Order"))?;
    let from = order.status;
    from.check_transition(request.to)?;

    let tracking_number = request
        .tracking_number
        .map(str::trim)
        .filter(|t| !t.is_empty() && request.to == OrderStatus::Shipped);
    let updated = state.db.apply_status_change(&StatusChange {
        order_id,
        from,
        to: request.to,
        actor_id: request.actor_id,
        note: request.note.map(str::trim).filter(|n| !n.is_empty()),
        tracking_number,
        payment_reference: request.payment_reference,
        restock: request.to == OrderStatus::Cancelled && from.restocks_on_cancel(),
    })?;
    info!(
        "Order {} moved from {} to {}",
        updated.order_number, from, updated.status
    );
    metrics::increment_labeled(
        MetricName::OrderTransitions,
        "to",
        updated.status.as_str().to_string(),
    );

    if updated.status.notifies_customer() {
        if let Some(email) = templates::order_status_update(&updated) {
            send_logged(state.mailer.as_ref(), &email).await;
        }
    }
    if updated.status == OrderStatus::Cancelled {
        state
            .notifier
            .publish_logged(
                NotificationKind::OrderCancelled,
                format!("Order {} cancelled", updated.order_number),
                format!(
                    "{} cancelled an order of {} (was {from})",
                    updated.email,
                    format_money(updated.total_cents)
                ),
                Some(format!("/admin/orders/{}", updated.id)),
            )
            .await;
    }
    Ok(updated)
}

pub fn list_my_orders(state: &AppState, user: &User, page: PageRequest) -> Result<Page<Order>> {
    let filter = OrderFilter {
        user_id: Some(user.id.clone()),
        ..Default::default()
    };
    let (orders, total) = state.db.list_orders(&filter, page)?;
    Ok(page.wrap(orders, total))
}

/// Other customers' orders look like missing ones.
pub fn get_order(state: &AppState, user: &User, order_id: &str) -> Result<OrderDetail> {
    let order = state
        .db
        .get_order(order_id)?
        .filter(|o| user.is_admin() || o.user_id.as_deref() == Some(user.id.as_str()))
        .ok_or_else(|| StoreError::not_found("Order"))?;
    let events = state.db.order_events(&order.id)?;
    Ok(OrderDetail { order, events })
}

pub async fn cancel_my_order(state: &AppState, user: &User, order_id: &str) -> Result<Order> {
    let order = state
        .db
        .get_order(order_id)?
        .filter(|o| o.user_id.as_deref() == Some(user.id.as_str()))
        .ok_or_else(|| StoreError::not_found("Order"))?;
    if !order.status.customer_cancellable() {
        return Err(StoreError::InvalidTransition {
            from: order.status.to_string(),
            to: OrderStatus::Cancelled.to_string(),
        });
    }
    let mut request = Transition::to(OrderStatus::Cancelled).by(&user.id);
    request.note = Some("Cancelled by customer");
    transition(state, &order.id, request).await
}
