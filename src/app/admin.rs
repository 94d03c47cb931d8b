//! Back-office operations. Callers must already have checked the admin role.

use super::catalog::unique_slug;
use super::export;
use super::orders::{transition, Transition};
use super::validation::text_len;
use crate::db::orders::OrderFilter;
use crate::db::products::{NewProduct, ProductBulkAction, ProductFilter, ProductSort};
use crate::db::users::UserFilter;
use crate::error::{Result, StoreError};
use crate::order_status::OrderStatus;
use crate::state::AppState;
use crate::types::{
    Notification, Order, OrderDetail, Page, PageRequest, Product, ProductListing, Role, User,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

// ---------------------------------------------------------------- products

#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub hair_types: Vec<String>,
    pub price_cents: i64,
    pub compare_at_cents: Option<i64>,
    #[serde(default)]
    pub stock: i64,
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Absent fields are left alone. `compare_at_cents: 0` and an empty
/// `image_url` clear those fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub hair_types: Option<Vec<String>>,
    pub price_cents: Option<i64>,
    pub compare_at_cents: Option<i64>,
    pub stock: Option<i64>,
    pub image_url: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminProductQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn check_money(field: &str, cents: i64) -> Result<()> {
    if cents < 0 {
        return Err(StoreError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}

pub fn list_products(state: &AppState, query: &AdminProductQuery) -> Result<Page<ProductListing>> {
    let page = PageRequest::new(query.page, query.per_page);
    let filter = ProductFilter {
        q: query.q.clone(),
        category: query.category.clone(),
        include_inactive: true,
        sort: query.sort,
        ..Default::default()
    };
    let (items, total) = state.db.list_products(&filter, page)?;
    Ok(page.wrap(items, total))
}

pub fn get_product(state: &AppState, id: &str) -> Result<Product> {
    state
        .db
        .get_product(id)?
        .ok_or_else(|| StoreError::not_found("Product"))
}

pub fn create_product(state: &AppState, input: &ProductInput) -> Result<Product> {
    let name = text_len("Name", &input.name, 1, 200)?;
    let category = text_len("Category", &input.category, 1, 60)?;
    check_money("Price", input.price_cents)?;
    if let Some(compare_at) = input.compare_at_cents {
        check_money("Compare-at price", compare_at)?;
    }
    if input.stock < 0 {
        return Err(StoreError::validation("Stock cannot be negative"));
    }
    let product = state.db.insert_product(&NewProduct {
        slug: unique_slug(state, &name)?,
        name,
        description: input.description.trim().to_string(),
        category,
        hair_types: input.hair_types.clone(),
        price_cents: input.price_cents,
        compare_at_cents: input.compare_at_cents.filter(|c| *c > 0),
        stock: input.stock,
        image_url: crate::types::non_empty(&input.image_url),
        active: input.active,
    })?;
    info!("Created product {} ({})", product.slug, product.id);
    Ok(product)
}

/// The slug never changes, so existing links keep working.
pub fn update_product(state: &AppState, id: &str, patch: &ProductPatch) -> Result<Product> {
    let mut product = get_product(state, id)?;
    if let Some(name) = &patch.name {
        product.name = text_len("Name", name, 1, 200)?;
    }
    if let Some(description) = &patch.description {
        product.description = description.trim().to_string();
    }
    if let Some(category) = &patch.category {
        product.category = text_len("Category", category, 1, 60)?;
    }
    if let Some(hair_types) = &patch.hair_types {
        product.hair_types = hair_types.clone();
    }
    if let Some(price) = patch.price_cents {
        check_money("Price", price)?;
        product.price_cents = price;
    }
    if let Some(compare_at) = patch.compare_at_cents {
        check_money("Compare-at price", compare_at)?;
        product.compare_at_cents = (compare_at > 0).then_some(compare_at);
    }
    if let Some(stock) = patch.stock {
        if stock < 0 {
            return Err(StoreError::validation("Stock cannot be negative"));
        }
        product.stock = stock;
    }
    if patch.image_url.is_some() {
        product.image_url = crate::types::non_empty(&patch.image_url);
    }
    if let Some(active) = patch.active {
        product.active = active;
    }
    state.db.save_product(&product)
}

/// Order items keep their snapshot; their product reference becomes null.
pub fn delete_product(state: &AppState, id: &str) -> Result<()> {
    if !state.db.delete_product(id)? {
        return Err(StoreError::not_found("Product"));
    }
    info!("Deleted product {id}");
    Ok(())
}

pub fn adjust_stock(state: &AppState, id: &str, delta: i64) -> Result<Product> {
    state.db.adjust_stock(id, delta)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkCount {
    pub affected: usize,
}

pub fn bulk_products(state: &AppState, ids: &[String], action: ProductBulkAction) -> Result<BulkCount> {
    let affected = state.db.bulk_product_action(ids, action)?;
    info!("Bulk {:?} applied to {} product(s)", action, affected);
    Ok(BulkCount { affected })
}

// ------------------------------------------------------------------ orders

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminOrderQuery {
    pub status: Option<OrderStatus>,
    pub q: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub updated: usize,
    pub skipped: Vec<Skipped>,
}

impl BulkOutcome {
    fn skip(&mut self, id: &str, reason: impl Into<String>) {
        self.skipped.push(Skipped {
            id: id.to_string(),
            reason: reason.into(),
        });
    }
}

pub fn list_orders(state: &AppState, query: &AdminOrderQuery) -> Result<Page<Order>> {
    let page = PageRequest::new(query.page, query.per_page);
    let filter = OrderFilter {
        user_id: None,
        status: query.status,
        q: query.q.clone(),
        from: query.from,
        to: query.to,
    };
    let (orders, total) = state.db.list_orders(&filter, page)?;
    Ok(page.wrap(orders, total))
}

pub fn get_order(state: &AppState, id: &str) -> Result<OrderDetail> {
    let order = state
        .db
        .get_order(id)?
        .ok_or_else(|| StoreError::not_found("Order"))?;
    let events = state.db.order_events(id)?;
    Ok(OrderDetail { order, events })
}

pub async fn update_order_status(
    state: &AppState,
    admin: &User,
    id: &str,
    update: &StatusUpdate,
) -> Result<Order> {
    if let Some(note) = &update.note {
        if note.chars().count() > 500 {
            return Err(StoreError::validation("Note must be at most 500 characters"));
        }
    }
    let mut request = Transition::to(update.status).by(&admin.id);
    request.note = update.note.as_deref();
    request.tracking_number = update.tracking_number.as_deref();
    transition(state, id, request).await
}

/// Each order is moved on its own; one failure does not stop the rest.
pub async fn bulk_order_status(
    state: &AppState,
    admin: &User,
    ids: &[String],
    status: OrderStatus,
) -> Result<BulkOutcome> {
    let mut outcome = BulkOutcome::default();
    for id in ids {
        match transition(state, id, Transition::to(status).by(&admin.id)).await {
            Ok(_) => outcome.updated += 1,
            Err(e @ (StoreError::NotFound(_)
            | StoreError::InvalidTransition { .. }
            | StoreError::Conflict(_))) => outcome.skip(id, e.to_string()),
            Err(e) => return Err(e),
        }
    }
    info!(
        "Bulk status {} on {} order(s): {} updated, {} skipped",
        status,
        ids.len(),
        outcome.updated,
        outcome.skipped.len()
    );
    Ok(outcome)
}

/// Only closed-out (cancelled or refunded) orders may be deleted.
pub fn bulk_delete_orders(state: &AppState, ids: &[String]) -> Result<BulkOutcome> {
    let mut outcome = BulkOutcome::default();
    for id in ids {
        match state.db.get_order(id)? {
            None => outcome.skip(id, "Order not found"),
            Some(order) if !order.status.is_terminal() => outcome.skip(
                id,
                format!("Order is {}, only cancelled or refunded orders can be deleted", order.status),
            ),
            Some(_) => {
                if state.db.delete_order(id)? {
                    outcome.updated += 1;
                }
            }
        }
    }
    Ok(outcome)
}

pub fn export_orders_csv(state: &AppState, status: Option<OrderStatus>) -> Result<String> {
    Ok(export::orders_csv(&state.db.all_orders(status)?))
}

// ------------------------------------------------------------------- users

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUserQuery {
    pub q: Option<String>,
    pub role: Option<Role>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub order_count: i64,
    pub lifetime_spend_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserBulkAction {
    Ban,
    Unban,
    MakeAdmin,
    MakeCustomer,
    Delete,
}

impl UserBulkAction {
    /// Actions an admin may not apply to their own account.
    fn locks_out_self(&self) -> bool {
        matches!(
            self,
            UserBulkAction::Ban | UserBulkAction::MakeCustomer | UserBulkAction::Delete
        )
    }
}

pub fn list_users(state: &AppState, query: &AdminUserQuery) -> Result<Page<User>> {
    let page = PageRequest::new(query.page, query.per_page);
    let filter = UserFilter {
        q: query.q.clone(),
        role: query.role,
    };
    let (users, total) = state.db.list_users(&filter, page)?;
    Ok(page.wrap(users, total))
}

pub fn get_user(state: &AppState, id: &str) -> Result<UserDetail> {
    let user = state
        .db
        .get_user(id)?
        .ok_or_else(|| StoreError::not_found("User"))?;
    let stats = state.db.user_order_stats(id)?;
    Ok(UserDetail {
        user,
        order_count: stats.order_count,
        lifetime_spend_cents: stats.lifetime_spend_cents,
    })
}

pub fn set_role(state: &AppState, admin: &User, id: &str, role: Role) -> Result<User> {
    let action = match role {
        Role::Admin => UserBulkAction::MakeAdmin,
        Role::Customer => UserBulkAction::MakeCustomer,
    };
    apply_user_action(state, admin, id, action)?;
    fetch_user(state, id)
}

pub fn set_banned(state: &AppState, admin: &User, id: &str, banned: bool) -> Result<User> {
    let action = if banned {
        UserBulkAction::Ban
    } else {
        UserBulkAction::Unban
    };
    apply_user_action(state, admin, id, action)?;
    fetch_user(state, id)
}

pub fn delete_user(state: &AppState, admin: &User, id: &str) -> Result<()> {
    apply_user_action(state, admin, id, UserBulkAction::Delete)
}

pub fn bulk_users(state: &AppState, admin: &User, ids: &[String], action: UserBulkAction) -> Result<BulkOutcome> {
    let mut outcome = BulkOutcome::default();
    for id in ids {
        match apply_user_action(state, admin, id, action) {
            Ok(()) => outcome.updated += 1,
            Err(e @ (StoreError::NotFound(_) | StoreError::Validation(_))) => {
                outcome.skip(id, e.to_string())
            }
            Err(e) => return Err(e),
        }
    }
    Ok(outcome)
}

fn fetch_user(state: &AppState, id: &str) -> Result<User> {
    state
        .db
        .get_user(id)?
        .ok_or_else(|| StoreError::not_found("User"))
}

fn apply_user_action(state: &AppState, admin: &User, id: &str, action: UserBulkAction) -> Result<()> {
    if id == admin.id && action.locks_out_self() {
        return Err(StoreError::validation(
            "You cannot ban, demote or delete your own account",
        ));
    }
    let found = match action {
        UserBulkAction::Ban => state.db.set_user_banned(id, true)?,
        UserBulkAction::Unban => state.db.set_user_banned(id, false)?,
        UserBulkAction::MakeAdmin => state.db.set_user_role(id, Role::Admin)?,
        UserBulkAction::MakeCustomer => state.db.set_user_role(id, Role::Customer)?,
        UserBulkAction::Delete => state.db.delete_user(id)?,
    };
    if !found {
        return Err(StoreError::not_found("User"));
    }
    info!("Admin {} applied {:?} to user {}", admin.id, action, id);
    Ok(())
}

// ----------------------------------------------------------- notifications

pub fn list_notifications(state: &AppState, unread_only: bool, page: PageRequest) -> Result<Page<Notification>> {
    let (items, total) = state.db.list_notifications(unread_only, page)?;
    Ok(page.wrap(items, total))
}

pub fn mark_notification_read(state: &AppState, id: &str) -> Result<()> {
    if !state.db.mark_notification_read(id)? {
        return Err(StoreError::not_found("Notification"));
    }
    Ok(())
}

pub fn mark_all_notifications_read(state: &AppState) -> Result<usize> {
    state.db.mark_all_notifications_read()
}
