use crate::error::{Result, StoreError};
use crate::state::AppState;
use crate::types::Cart;

pub fn get_cart(state: &AppState, user_id: &str) -> Result<Cart> {
    let lines = state.db.cart_lines(user_id)?;
    let item_count = lines.iter().map(|l| l.quantity).sum();
    let subtotal_cents = lines.iter().map(|l| l.line_total_cents).sum();
    Ok(Cart {
        lines,
        item_count,
        subtotal_cents,
    })
}

/// Adds on top of whatever quantity is already in the cart.
pub fn add_item(state: &AppState, user_id: &str, product_id: &str, quantity: i64) -> Result<Cart> {
    if quantity < 1 {
        return Err(StoreError::validation("Quantity must be at least 1"));
    }
    let existing = state.db.cart_quantity(user_id, product_id)?.unwrap_or(0);
    store_quantity(state, user_id, product_id, existing + quantity)?;
    get_cart(state, user_id)
}

/// Zero removes the line.
pub fn set_quantity(state: &AppState, user_id: &str, product_id: &str, quantity: i64) -> Result<Cart> {
    if quantity < 0 {
        return Err(StoreError::validation("Quantity cannot be negative"));
    }
    if quantity == 0 {
        state.db.remove_cart_item(user_id, product_id)?;
    } else {
        store_quantity(state, user_id, product_id, quantity)?;
    }
    get_cart(state, user_id)
}

pub fn remove_item(state: &AppState, user_id: &str, product_id: &str) -> Result<Cart> {
    state.db.remove_cart_item(user_id, product_id)?;
    get_cart(state, user_id)
}

pub fn clear(state: &AppState, user_id: &str) -> Result<Cart> {
    state.db.clear_cart(user_id)?;
    get_cart(state, user_id)
}

fn store_quantity(state: &AppState, user_id: &str, product_id: &str, quantity: i64) -> Result<()> {
    let product = state
        .db
        .get_product(product_id)?
        .filter(|p| p.active)
        .ok_or_else(|| StoreError::not_found("Product"))?;
    let max = state.config.shop.max_cart_quantity;
    if quantity > max {
        return Err(StoreError::validation(format!(
            "You can add at most {max} of one product"
        )));
    }
    if quantity > product.stock {
        return Err(StoreError::validation(match product.stock {
            0 => format!("{} is out of stock", product.name),
            n => format!("Only {n} of {} left in stock", product.name),
        }));
    }
    state.db.set_cart_quantity(user_id, product_id, quantity)
}
