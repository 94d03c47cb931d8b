use super::cart;
use crate::error::{Result, StoreError};
use crate::state::AppState;
use crate::types::{Cart, WishlistEntry};

pub fn list(state: &AppState, user_id: &str) -> Result<Vec<WishlistEntry>> {
    state.db.wishlist(user_id)
}

pub fn add(state: &AppState, user_id: &str, product_id: &str) -> Result<Vec<WishlistEntry>> {
    if state.db.get_product(product_id)?.is_none() {
        return Err(StoreError::not_found("Product"));
    }
    state.db.add_to_wishlist(user_id, product_id)?;
    state.db.wishlist(user_id)
}

pub fn remove(state: &AppState, user_id: &str, product_id: &str) -> Result<Vec<WishlistEntry>> {
    state.db.remove_from_wishlist(user_id, product_id)?;
    state.db.wishlist(user_id)
}

/// The product stays on the wishlist if the cart rejects it.
pub fn move_to_cart(state: &AppState, user_id: &str, product_id: &str) -> Result<Cart> {
    let cart = cart::add_item(state, user_id, product_id, 1)?;
    state.db.remove_from_wishlist(user_id, product_id)?;
    Ok(cart)
}
