//! `/api/admin` handlers. Every one takes `AdminUser`.

use super::extract::AdminUser;
use crate::app::admin::{
    self, AdminOrderQuery, AdminProductQuery, AdminUserQuery, BulkCount, BulkOutcome, ProductInput,
    ProductPatch, StatusUpdate, UserBulkAction, UserDetail,
};
use crate::app::analytics::{self, Dashboard};
use crate::app::complaints::{self, ComplaintUpdate};
use crate::app::newsletter::{self, CampaignResult};
use crate::db::products::ProductBulkAction;
use crate::error::{Result, StoreError};
use crate::infra::uploads::StoredImage;
use crate::order_status::OrderStatus;
use crate::state::AppState;
use crate::types::{
    Complaint, ComplaintStatus, Notification, Order, OrderDetail, Page, PageRequest, Product,
    ProductListing, Role, Subscriber, User,
};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use tracing::{info, warn};

fn csv_download(filename: &str, body: String) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct ProductBulkRequest {
    pub ids: Vec<String>,
    pub action: ProductBulkAction,
}

#[derive(Debug, Deserialize)]
pub struct OrderBulkStatus {
    pub ids: Vec<String>,
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct IdList {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct BanChange {
    pub banned: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserBulkRequest {
    pub ids: Vec<String>,
    pub action: UserBulkAction,
}

#[derive(Debug, Deserialize)]
pub struct SubscriberQuery {
    pub active: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct Campaign {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ComplaintQuery {
    pub status: Option<ComplaintStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<i64>,
}

// products

pub async fn list_products(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<AdminProductQuery>,
) -> Result<Json<Page<ProductListing>>> {
    admin::list_products(&state, &query).map(Json)
}

pub async fn get_product(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    admin::get_product(&state, &id).map(Json)
}

pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = admin::create_product(&state, &input)?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>> {
    admin::update_product(&state, &id, &patch).map(Json)
}

pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    admin::delete_product(&state, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn adjust_stock(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(body): Json<StockAdjustment>,
) -> Result<Json<Product>> {
    admin::adjust_stock(&state, &id, body.delta).map(Json)
}

pub async fn bulk_products(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(body): Json<ProductBulkRequest>,
) -> Result<Json<BulkCount>> {
    admin::bulk_products(&state, &body.ids, body.action).map(Json)
}

// orders

pub async fn list_orders(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<AdminOrderQuery>,
) -> Result<Json<Page<Order>>> {
    admin::list_orders(&state, &query).map(Json)
}

pub async fn get_order(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<OrderDetail>> {
    admin::get_order(&state, &id).map(Json)
}

pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    admin::update_order_status(&state, &user, &id, &update)
        .await
        .map(Json)
}

pub async fn bulk_order_status(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Json(body): Json<OrderBulkStatus>,
) -> Result<Json<BulkOutcome>> {
    admin::bulk_order_status(&state, &user, &body.ids, body.status)
        .await
        .map(Json)
}

pub async fn bulk_delete_orders(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(body): Json<IdList>,
) -> Result<Json<BulkOutcome>> {
    admin::bulk_delete_orders(&state, &body.ids).map(Json)
}

pub async fn export_orders(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    let csv = admin::export_orders_csv(&state, query.status)?;
    Ok(csv_download("orders.csv", csv))
}

// users

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<AdminUserQuery>,
) -> Result<Json<Page<User>>> {
    admin::list_users(&state, &query).map(Json)
}

pub async fn get_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<UserDetail>> {
    admin::get_user(&state, &id).map(Json)
}

pub async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin_user): AdminUser,
    Path(id): Path<String>,
    Json(body): Json<RoleChange>,
) -> Result<Json<User>> {
    admin::set_role(&state, &admin_user, &id, body.role).map(Json)
}

pub async fn set_banned(
    State(state): State<AppState>,
    AdminUser(admin_user): AdminUser,
    Path(id): Path<String>,
    Json(body): Json<BanChange>,
) -> Result<Json<User>> {
    admin::set_banned(&state, &admin_user, &id, body.banned).map(Json)
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin_user): AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    admin::delete_user(&state, &admin_user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_users(
    State(state): State<AppState>,
    AdminUser(admin_user): AdminUser,
    Json(body): Json<UserBulkRequest>,
) -> Result<Json<BulkOutcome>> {
    admin::bulk_users(&state, &admin_user, &body.ids, body.action).map(Json)
}

// newsletter

pub async fn list_subscribers(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<SubscriberQuery>,
) -> Result<Json<Page<Subscriber>>> {
    let page = PageRequest::new(query.page, query.per_page);
    newsletter::list_subscribers(&state, query.active, page).map(Json)
}

pub async fn export_subscribers(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Response> {
    let csv = newsletter::export_subscribers_csv(&state)?;
    Ok(csv_download("subscribers.csv", csv))
}

pub async fn send_campaign(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Json(campaign): Json<Campaign>,
) -> Result<Json<CampaignResult>> {
    let result = newsletter::send_campaign(&state, &campaign.subject, &campaign.body).await?;
    info!(
        "Campaign by {}: {} sent, {} failed",
        user.id, result.sent, result.failed
    );
    Ok(Json(result))
}

// complaints

pub async fn list_complaints(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<ComplaintQuery>,
) -> Result<Json<Page<Complaint>>> {
    let page = PageRequest::new(query.page, query.per_page);
    complaints::list(&state, query.status, page).map(Json)
}

pub async fn get_complaint(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Complaint>> {
    complaints::get(&state, &id).map(Json)
}

pub async fn update_complaint(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(update): Json<ComplaintUpdate>,
) -> Result<Json<Complaint>> {
    complaints::update(&state, &id, &update).await.map(Json)
}

// notifications

pub async fn list_notifications(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Page<Notification>>> {
    let page = PageRequest::new(query.page, query.per_page);
    admin::list_notifications(&state, query.unread, page).map(Json)
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    admin::mark_notification_read(&state, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Value>> {
    let marked = admin::mark_all_notifications_read(&state)?;
    Ok(Json(json!({ "marked": marked })))
}

/// Live feed of new notifications. Each SSE event is named after the kind.
pub async fn notification_stream(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    info!("Admin {} opened the notification stream", user.id);
    let stream = BroadcastStream::new(state.notifier.subscribe()).filter_map(|item| match item {
        Ok(notification) => Event::default()
            .event(notification.kind.as_str())
            .json_data(&notification)
            .ok()
            .map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("Notification stream lagged, skipped {} event(s)", skipped);
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// analytics

pub async fn dashboard(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Dashboard>> {
    analytics::dashboard(&state, query.days).map(Json)
}

// uploads

pub async fn upload_image(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<StoredImage>)> {
    // Oversized bodies are cut off by the route's body limit before the store sees them.
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            StoreError::PayloadTooLarge {
                limit: state.uploads.max_bytes(),
            }
        } else {
            StoreError::validation(rejection.body_text())
        }
    })?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| StoreError::UnsupportedMedia("missing Content-Type".into()))?;
    let stored = state.uploads.store_image(&body, content_type).await?;
    info!("Admin {} uploaded {} ({} bytes)", user.id, stored.url, stored.bytes);
    Ok((StatusCode::CREATED, Json(stored)))
}
