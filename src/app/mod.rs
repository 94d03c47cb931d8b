//! Use cases. Each takes the shared [`AppState`](crate::state::AppState) and
//! returns domain values; HTTP and GraphQL are thin layers over these.

pub mod account;
pub mod addresses;
pub mod admin;
pub mod analytics;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod complaints;
pub mod export;
pub mod newsletter;
pub mod orders;
pub mod payments;
pub mod reviews;
pub mod setup;
pub mod validation;
pub mod wishlist;

use crate::error::{Result, StoreError};

/// Run CPU-heavy work (password hashing) on the blocking pool.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Internal(format!("blocking task failed: {e}")))?
}
