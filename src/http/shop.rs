use super::extract::CurrentUser;
use super::PageQuery;
use crate::app::checkout::{self, CheckoutRequest};
use crate::app::{addresses, cart, orders, payments, wishlist};
use crate::error::Result;
use crate::state::AppState;
use crate::types::{Address, AddressInput, Cart, Order, OrderDetail, Page, WishlistEntry};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;

pub const SIGNATURE_HEADER: &str = "x-payment-signature";

#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct WishlistAdd {
    pub product_id: String,
}

// cart

pub async fn get_cart(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<Cart>> {
    cart::get_cart(&state, &user.id).map(Json)
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AddToCart>,
) -> Result<Json<Cart>> {
    cart::add_item(&state, &user.id, &body.product_id, body.quantity).map(Json)
}

pub async fn set_cart_quantity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<String>,
    Json(body): Json<SetQuantity>,
) -> Result<Json<Cart>> {
    cart::set_quantity(&state, &user.id, &product_id, body.quantity).map(Json)
}

pub async fn remove_from_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<String>,
) -> Result<Json<Cart>> {
    cart::remove_item(&state, &user.id, &product_id).map(Json)
}

pub async fn clear_cart(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<Cart>> {
    cart::clear(&state, &user.id).map(Json)
}

// checkout and payment

pub async fn checkout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = checkout::checkout(&state, &user, &request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// The signature covers the raw body, so it is read as bytes.
pub async fn confirm_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Order>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    payments::confirm_payment(&state, &body, signature).await.map(Json)
}

// orders

pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Order>>> {
    orders::list_my_orders(&state, &user, page.request()).map(Json)
}

pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderDetail>> {
    orders::get_order(&state, &user, &id).map(Json)
}

pub async fn cancel_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    orders::cancel_my_order(&state, &user, &id).await.map(Json)
}

// wishlist

pub async fn get_wishlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<WishlistEntry>>> {
    wishlist::list(&state, &user.id).map(Json)
}

pub async fn add_to_wishlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<WishlistAdd>,
) -> Result<Json<Vec<WishlistEntry>>> {
    wishlist::add(&state, &user.id, &body.product_id).map(Json)
}

pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<String>,
) -> Result<Json<Vec<WishlistEntry>>> {
    wishlist::remove(&state, &user.id, &product_id).map(Json)
}

pub async fn move_to_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<String>,
) -> Result<Json<Cart>> {
    wishlist::move_to_cart(&state, &user.id, &product_id).map(Json)
}

// addresses

pub async fn list_addresses(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Address>>> {
    addresses::list(&state, &user.id).map(Json)
}

pub async fn create_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = addresses::create(&state, &user.id, &input)?;
    Ok((StatusCode::CREATED, Json(address)))
}

pub async fn update_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<AddressInput>,
) -> Result<Json<Address>> {
    addresses::update(&state, &user.id, &id, &input).map(Json)
}

pub async fn delete_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    addresses::delete(&state, &user.id, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_default_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Address>>> {
    addresses::set_default(&state, &user.id, &id).map(Json)
}
