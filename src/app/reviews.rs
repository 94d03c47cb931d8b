use super::validation::text_len;
use crate::db::reviews::NewReview;
use crate::error::{Result, StoreError};
use crate::state::AppState;
use crate::types::{Page, PageRequest, Review, User};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: i64,
    pub title: String,
    pub body: String,
}

pub fn submit_review(state: &AppState, user: &User, slug: &str, input: &ReviewInput) -> Result<Review> {
    if !(1..=5).contains(&input.rating) {
        return Err(StoreError::validation("Rating must be between 1 and 5"));
    }
    let title = text_len("Title", &input.title, 1, 120)?;
    let body = text_len("Review", &input.body, 10, 2000)?;
    let product = state
        .db
        .get_product_by_slug(slug)?
        .filter(|p| p.active)
        .ok_or_else(|| StoreError::not_found("Product"))?;
    if state.db.has_reviewed(&user.id, &product.id)? {
        return Err(StoreError::conflict("You have already reviewed this product"));
    }
    let verified_purchase = state.db.user_has_purchased(&user.id, &product.id)?;
    state.db.insert_review(&NewReview {
        product_id: &product.id,
        user_id: &user.id,
        rating: input.rating,
        title: &title,
        body: &body,
        verified_purchase,
    })
}

pub fn list_reviews(state: &AppState, slug: &str, page: PageRequest) -> Result<Page<Review>> {
    let product = state
        .db
        .get_product_by_slug(slug)?
        .filter(|p| p.active)
        .ok_or_else(|| StoreError::not_found("Product"))?;
    let (reviews, total) = state.db.list_reviews(&product.id, page)?;
    Ok(page.wrap(reviews, total))
}

/// Authors and admins only; anyone else sees NotFound.
pub fn delete_review(state: &AppState, user: &User, review_id: &str) -> Result<()> {
    state
        .db
        .get_review(review_id)?
        .filter(|r| user.is_admin() || r.user_id == user.id)
        .ok_or_else(|| StoreError::not_found("Review"))?;
    state.db.delete_review(review_id)?;
    Ok(())
}
