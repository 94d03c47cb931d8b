use super::{get_enum, get_opt_enum, get_opt_ts, get_ts, is_unique_violation, like_pattern, new_id, ts, Database};
use crate::error::{Result, StoreError};
use crate::order_status::OrderStatus;
use crate::types::{Order, OrderEvent, OrderItem, PageRequest, ShippingAddress};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};

const ORDER_COLUMNS: &str = "id, order_number, user_id, email, status, subtotal_cents, shipping_cents, \
     tax_cents, total_cents, ship_recipient, ship_line1, ship_line2, ship_city, ship_region, \
     ship_postal_code, ship_country, ship_phone, notes, payment_reference, tracking_number, \
     created_at, updated_at, paid_at";

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        order_number: row.get(1)?,
        user_id: row.get(2)?,
        email: row.get(3)?,
        status: get_enum(row, 4)?,
        subtotal_cents: row.get(5)?,
        shipping_cents: row.get(6)?,
        tax_cents: row.get(7)?,
        total_cents: row.get(8)?,
        shipping_address: ShippingAddress {
            recipient: row.get(9)?,
            line1: row.get(10)?,
            line2: row.get(11)?,
            city: row.get(12)?,
            region: row.get(13)?,
            postal_code: row.get(14)?,
            country: row.get(15)?,
            phone: row.get(16)?,
        },
        notes: row.get(17)?,
        payment_reference: row.get(18)?,
        tracking_number: row.get(19)?,
        created_at: get_ts(row, 20)?,
        updated_at: get_ts(row, 21)?,
        paid_at: get_opt_ts(row, 22)?,
        items: Vec::new(),
    })
}

fn load_items(conn: &Connection, order_id: &str) -> rusqlite::Result<Vec<OrderItem>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, product_id, product_name, unit_price_cents, quantity
         FROM order_items WHERE order_id = ?1 ORDER BY rowid",
    )?;
    let items: rusqlite::Result<Vec<OrderItem>> = stmt
        .query_map(params![order_id], |row| {
            let unit_price_cents: i64 = row.get(3)?;
            let quantity: i64 = row.get(4)?;
            Ok(OrderItem {
                id: row.get(0)?,
                product_id: row.get(1)?,
                product_name: row.get(2)?,
                unit_price_cents,
                quantity,
                line_total_cents: unit_price_cents * quantity,
            })
        })?
        .collect();
    items
}

fn fetch_order(conn: &Connection, id: &str) -> rusqlite::Result<Option<Order>> {
    let order = conn
        .query_row(
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
            params![id],
            order_from_row,
        )
        .optional()?;
    match order {
        Some(mut order) => {
            order.items = load_items(conn, &order.id)?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: String,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
}

/// Everything checkout has computed; written atomically by [`Database::create_order`].
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: String,
    pub email: String,
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

/// A validated status change, applied by [`Database::apply_status_change`].
#[derive(Debug, Clone)]
pub struct StatusChange<'a> {
    pub order_id: &'a str,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub actor_id: Option<&'a str>,
    pub note: Option<&'a str>,
    pub tracking_number: Option<&'a str>,
    pub payment_reference: Option<&'a str>,
    pub restock: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<String>,
    pub status: Option<OrderStatus>,
    /// Matches order number or customer email.
    pub q: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl OrderFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values = Vec::new();
        if let Some(user_id) = &self.user_id {
            clauses.push("user_id = ?");
            values.push(Value::Text(user_id.clone()));
        }
        if let Some(status) = self.status {
            clauses.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            clauses.push("(LOWER(order_number) LIKE ? ESCAPE '\\' OR LOWER(email) LIKE ? ESCAPE '\\')");
            let pattern = like_pattern(q);
            values.push(Value::Text(pattern.clone()));
            values.push(Value::Text(pattern));
        }
        if let Some(from) = &self.from {
            clauses.push("created_at >= ?");
            values.push(Value::Text(ts(from)));
        }
        if let Some(to) = &self.to {
            clauses.push("created_at < ?");
            values.push(Value::Text(ts(to)));
        }
        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        (sql, values)
    }
}

impl Database {
    /// Write the order, reserve stock, empty the cart and log the first event,
    /// all in one transaction. Fails with `Conflict` if any item no longer has
    /// enough stock.
    pub fn create_order(&self, new: &NewOrder) -> Result<Order> {
        let order_id = new_id();
        let now = ts(&Utc::now());
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let address = &new.shipping_address;
        tx.execute(
            &format!(
                "INSERT INTO orders ({ORDER_COLUMNS}) VALUES
                 (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                  ?17, NULL, NULL, ?18, ?18, NULL)"
            ),
            params![
                order_id,
                new.order_number,
                new.user_id,
                new.email,
                new.subtotal_cents,
                new.shipping_cents,
                new.tax_cents,
                new.total_cents,
                address.recipient,
                address.line1,
                address.line2,
                address.city,
                address.region,
                address.postal_code,
                address.country,
                address.phone,
                new.notes,
                now,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::conflict("Order number collision, please retry")
            } else {
                e.into()
            }
        })?;

        for item in &new.items {
            let reserved = tx.execute(
                "UPDATE products SET stock = stock - ?2, updated_at = ?3
                 WHERE id = ?1 AND active = 1 AND stock >= ?2",
                params![item.product_id, item.quantity, now],
            )?;
            if reserved == 0 {
                return Err(StoreError::conflict(format!(
                    "{} is no longer available in the requested quantity",
                    item.product_name
                )));
            }
            tx.execute(
                "INSERT INTO order_items (id, order_id, product_id, product_name, unit_price_cents, quantity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    new_id(),
                    order_id,
                    item.product_id,
                    item.product_name,
                    item.unit_price_cents,
                    item.quantity
                ],
            )?;
        }

        tx.execute("DELETE FROM cart_items WHERE user_id = ?1", params![new.user_id])?;
        tx.execute(
            "INSERT INTO order_events (id, order_id, from_status, to_status, actor_id, note, created_at)
             VALUES (?1, ?2, NULL, 'pending', ?3, NULL, ?4)",
            params![new_id(), order_id, new.user_id, now],
        )?;
        tx.commit()?;

        fetch_order(&conn, &order_id)?.ok_or_else(|| StoreError::not_found("Order"))
    }

    pub fn get_order(&self, id: &str) -> Result<Option<Order>> {
        let conn = self.conn()?;
        Ok(fetch_order(&conn, id)?)
    }

    pub fn order_events(&self, order_id: &str) -> Result<Vec<OrderEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, from_status, to_status, actor_id, note, created_at
             FROM order_events WHERE order_id = ?1 ORDER BY created_at, rowid",
        )?;
        let events = stmt
            .query_map(params![order_id], |row| {
                Ok(OrderEvent {
                    id: row.get(0)?,
                    from_status: get_opt_enum(row, 1)?,
                    to_status: get_enum(row, 2)?,
                    actor_id: row.get(3)?,
                    note: row.get(4)?,
                    created_at: get_ts(row, 5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    /// Newest first, with items.
    pub fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> Result<(Vec<Order>, i64)> {
        let (where_sql, mut values) = filter.where_clause();
        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM orders {where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        values.push(Value::Integer(page.limit()));
        values.push(Value::Integer(page.offset()));
        let mut orders = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders {where_sql}
                 ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
            ))?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), order_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        for order in &mut orders {
            order.items = load_items(&conn, &order.id)?;
        }
        Ok((orders, total))
    }

    /// Every matching order, oldest first, for exports.
    pub fn all_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        let filter = OrderFilter {
            status,
            ..Default::default()
        };
        let (where_sql, values) = filter.where_clause();
        let conn = self.conn()?;
        let mut orders = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders {where_sql} ORDER BY created_at, id"
            ))?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), order_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        for order in &mut orders {
            order.items = load_items(&conn, &order.id)?;
        }
        Ok(orders)
    }

    /// Apply a status change that the caller has already validated against
    /// the state machine. The update is guarded on the expected current
    /// status, so two racing changes cannot both win.
    pub fn apply_status_change(&self, change: &StatusChange<'_>) -> Result<Order> {
        let (from, to) = (change.from, change.to);
        let now = ts(&Utc::now());
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE orders SET status = ?3, updated_at = ?4,
                    tracking_number = COALESCE(?5, tracking_number),
                    payment_reference = COALESCE(?6, payment_reference),
                    paid_at = CASE WHEN ?3 = 'paid' THEN ?4 ELSE paid_at END
             WHERE id = ?1 AND status = ?2",
            params![
                change.order_id,
                from.as_str(),
                to.as_str(),
                now,
                change.tracking_number,
                change.payment_reference,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::conflict(
                "Order was changed by another request, reload and try again",
            ));
        }

        if change.restock {
            tx.execute(
                "UPDATE products SET stock = stock + (
                     SELECT SUM(oi.quantity) FROM order_items oi
                     WHERE oi.order_id = ?1 AND oi.product_id = products.id),
                     updated_at = ?2
                 WHERE id IN (SELECT product_id FROM order_items
                              WHERE order_id = ?1 AND product_id IS NOT NULL)",
                params![change.order_id, now],
            )?;
        }

        tx.execute(
            "INSERT INTO order_events (id, order_id, from_status, to_status, actor_id, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new_id(),
                change.order_id,
                from.as_str(),
                to.as_str(),
                change.actor_id,
                change.note,
                now
            ],
        )?;
        tx.commit()?;

        fetch_order(&conn, change.order_id)?.ok_or_else(|| StoreError::not_found("Order"))
    }

    pub fn delete_order(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM orders WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Whether the user has a paid-or-later order containing the product.
    pub fn user_has_purchased(&self, user_id: &str, product_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM orders o JOIN order_items oi ON oi.order_id = o.id
                 WHERE o.user_id = ?1 AND oi.product_id = ?2
                   AND o.status IN ('paid', 'processing', 'shipped', 'delivered')
                 LIMIT 1",
                params![user_id, product_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::products::NewProduct;
    use crate::types::Role;

    fn placed_order(db: &Database) -> (Order, String) {
        let user = db
            .insert_user("buyer@example.com", "Buyer", "x", Role::Customer)
            .unwrap();
        let product = db
            .insert_product(&NewProduct {
                slug: "scalp-oil".into(),
                name: "Scalp Oil".into(),
                description: "Rosemary and peppermint".into(),
                category: "care".into(),
                hair_types: vec![],
                price_cents: 1500,
                compare_at_cents: None,
                stock: 5,
                image_url: None,
                active: true,
            })
            .unwrap();
        let order = db
            .create_order(&NewOrder {
                order_number: "HC-20260101-ABC123".into(),
                user_id: user.id,
                email: "buyer@example.com".into(),
                subtotal_cents: 3000,
                shipping_cents: 599,
                tax_cents: 240,
                total_cents: 3839,
                shipping_address: ShippingAddress {
                    recipient: "Buyer".into(),
                    line1: "1 Main St".into(),
                    line2: None,
                    city: "Austin".into(),
                    region: None,
                    postal_code: "73301".into(),
                    country: "US".into(),
                    phone: None,
                },
                notes: None,
                items: vec![NewOrderItem {
                    product_id: product.id.clone(),
                    product_name: product.name.clone(),
                    unit_price_cents: 1500,
                    quantity: 2,
                }],
            })
            .unwrap();
        (order, product.id)
    }

    fn change(order_id: &str, from: OrderStatus, to: OrderStatus, restock: bool) -> StatusChange<'_> {
        StatusChange {
            order_id,
            from,
            to,
            actor_id: None,
            note: Some("ops"),
            tracking_number: None,
            payment_reference: None,
            restock,
        }
    }

    #[test]
    fn test_status_change_is_guarded_on_current_status() {
        let db = Database::open_in_memory().unwrap();
        let (order, _) = placed_order(&db);

        let stale = change(&order.id, OrderStatus::Paid, OrderStatus::Processing, false);
        assert!(matches!(
            db.apply_status_change(&stale),
            Err(StoreError::Conflict(_))
        ));

        let paid = db
            .apply_status_change(&change(&order.id, OrderStatus::Pending, OrderStatus::Paid, false))
            .unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        assert!(paid.paid_at.is_some());

        let events = db.order_events(&order.id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].from_status, Some(OrderStatus::Pending));
        assert_eq!(events[1].to_status, OrderStatus::Paid);
        assert_eq!(events[1].note.as_deref(), Some("ops"));
    }

    #[test]
    fn test_restock_returns_ordered_quantities() {
        let db = Database::open_in_memory().unwrap();
        let (order, product_id) = placed_order(&db);
        assert_eq!(db.get_product(&product_id).unwrap().unwrap().stock, 3);

        db.apply_status_change(&change(&order.id, OrderStatus::Pending, OrderStatus::Cancelled, true))
            .unwrap();
        assert_eq!(db.get_product(&product_id).unwrap().unwrap().stock, 5);
    }
}
