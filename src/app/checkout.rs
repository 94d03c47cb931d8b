use super::cart::get_cart;
use crate::config::ShopConfig;
use crate::crypto::random_code;
use crate::db::orders::{NewOrder, NewOrderItem};
use crate::error::{Result, StoreError};
use crate::metrics::{self, MetricName};
use crate::state::AppState;
use crate::types::{format_money, AddressInput, NotificationKind, Order, ShippingAddress, User};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: Option<String>,
    pub address: Option<AddressInput>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Shipping is free at or above the threshold. Tax rounds half up.
pub fn compute_totals(subtotal_cents: i64, shop: &ShopConfig) -> Totals {
    let shipping_cents = if subtotal_cents >= shop.free_shipping_threshold_cents {
        0
    } else {
        shop.flat_shipping_cents
    };
    let tax_cents = (subtotal_cents * shop.tax_rate_bps + 5_000) / 10_000;
    Totals {
        subtotal_cents,
        shipping_cents,
        tax_cents,
        total_cents: subtotal_cents + shipping_cents + tax_cents,
    }
}

/// `HC-YYYYMMDD-XXXXXX`.
pub fn order_number() -> String {
    format!("HC-{}-{}", Utc::now().format("%Y%m%d"), random_code(6))
}

pub async fn checkout(state: &AppState, user: &User, request: &CheckoutRequest) -> Result<Order> {
    let notes = match request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) if n.chars().count() > 500 => {
            return Err(StoreError::validation("Notes must be at most 500 characters"))
        }
        other => other.map(str::to_string),
    };
    let shipping_address = resolve_address(state, user, request)?;

    let cart = get_cart(state, &user.id)?;
    if cart.lines.is_empty() {
        return Err(StoreError::validation("Your cart is empty"));
    }
    for line in &cart.lines {
        if !line.available {
            return Err(StoreError::conflict(format!("{} is no longer available", line.name)));
        }
        if line.quantity > line.stock {
            return Err(StoreError::conflict(format!(
                "Only {} of {} left in stock",
                line.stock, line.name
            )));
        }
    }

    let totals = compute_totals(cart.subtotal_cents, &state.config.shop);
    let new_order = NewOrder {
        order_number: order_number(),
        user_id: user.id.clone(),
        email: user.email.clone(),
        subtotal_cents: totals.subtotal_cents,
        shipping_cents: totals.shipping_cents,
        tax_cents: totals.tax_cents,
        total_cents: totals.total_cents,
        shipping_address,
        notes,
        items: cart
            .lines
            .iter()
            .map(|line| NewOrderItem {
                product_id: line.product_id.clone(),
                product_name: line.name.clone(),
                unit_price_cents: line.unit_price_cents,
                quantity: line.quantity,
            })
            .collect(),
    };
    let order = state.db.create_order(&new_order)?;
    info!(
        "Order {} placed by {} for {}",
        order.order_number,
        user.id,
        format_money(order.total_cents)
    );
    metrics::increment(MetricName::OrdersCreated);
    metrics::record(MetricName::OrderRevenueCents, order.total_cents as f64);

    state
        .notifier
        .publish_logged(
            NotificationKind::OrderCreated,
            format!("New order {}", order.order_number),
            format!(
                "{} placed an order of {} ({} item(s))",
                order.email,
                format_money(order.total_cents),
                cart.item_count
            ),
            Some(format!("/admin/orders/{}", order.id)),
        )
        .await;
    notify_low_stock(state, &order).await;
    Ok(order)
}

fn resolve_address(state: &AppState, user: &User, request: &CheckoutRequest) -> Result<ShippingAddress> {
    match (&request.address_id, &request.address) {
        (Some(id), _) => state
            .db
            .get_address(&user.id, id)?
            .map(|a| ShippingAddress::from(&a))
            .ok_or_else(|| StoreError::not_found("Address")),
        (None, Some(input)) => {
            super::addresses::validate(input)?;
            Ok(ShippingAddress::from(input))
        }
        (None, None) => Err(StoreError::validation("A shipping address is required")),
    }
}

async fn notify_low_stock(state: &AppState, order: &Order) {
    let threshold = state.config.shop.low_stock_threshold;
    for item in &order.items {
        let Some(product_id) = &item.product_id else {
            continue;
        };
        let product = match state.db.get_product(product_id) {
            Ok(Some(product)) => product,
            _ => continue,
        };
        if product.stock <= threshold {
            state
                .notifier
                .publish_logged(
                    NotificationKind::LowStock,
                    format!("Low stock: {}", product.name),
                    format!("{} has {} left", product.name, product.stock),
                    Some(format!("/admin/products/{}", product.id)),
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_below_free_shipping() {
        let totals = compute_totals(2400, &ShopConfig::default());
        assert_eq!(
            totals,
            Totals {
                subtotal_cents: 2400,
                shipping_cents: 599,
                tax_cents: 192,
                total_cents: 3191,
            }
        );
    }

    #[test]
    fn test_free_shipping_at_threshold() {
        let totals = compute_totals(5000, &ShopConfig::default());
        assert_eq!(totals.shipping_cents, 0);
        assert_eq!(totals.total_cents, 5400);
    }

    #[test]
    fn test_tax_rounds_half_up() {
        let shop = ShopConfig {
            tax_rate_bps: 825,
            ..ShopConfig::default()
        };
        // 1999 * 8.25% = 164.9175
        assert_eq!(compute_totals(1999, &shop).tax_cents, 165);
        // 200 * 8.25% = 16.5
        assert_eq!(compute_totals(200, &shop).tax_cents, 17);
        // 100 * 8.25% = 8.25
        assert_eq!(compute_totals(100, &shop).tax_cents, 8);
    }

    #[test]
    fn test_order_number_shape() {
        let number = order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "HC");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
