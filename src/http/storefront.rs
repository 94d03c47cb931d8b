use super::extract::CurrentUser;
use super::PageQuery;
use crate::app::catalog::{self, ProductQuery};
use crate::app::reviews::{self, ReviewInput};
use crate::error::Result;
use crate::state::AppState;
use crate::types::{Category, Page, ProductDetail, ProductListing, Review};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Page<ProductListing>>> {
    catalog::list_products(&state, &query).map(Json)
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>> {
    catalog::get_product(&state, &slug).map(Json)
}

pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    catalog::categories(&state).map(Json)
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Review>>> {
    reviews::list_reviews(&state, &slug, page.request()).map(Json)
}

pub async fn submit_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = reviews::submit_review(&state, &user, &slug, &input)?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn delete_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    reviews::delete_review(&state, &user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
