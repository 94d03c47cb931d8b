use super::{blocking, validation};
use crate::crypto::{hash_password, sha256_hex, verify_password};
use crate::error::{Result, StoreError};
use crate::state::AppState;
use crate::types::User;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    /// An empty string clears the phone; absent leaves it unchanged.
    pub phone: Option<String>,
}

pub fn update_profile(state: &AppState, user: &User, update: &ProfileUpdate) -> Result<User> {
    let name = match &update.name {
        Some(name) => validation::name(name)?,
        None => user.name.clone(),
    };
    let phone = match &update.phone {
        Some(phone) => validation::phone(Some(phone))?,
        None => user.phone.clone(),
    };
    state
        .db
        .update_user_profile(&user.id, &name, phone.as_deref())?
        .ok_or_else(|| StoreError::not_found("User"))
}

/// Every other session of the user is revoked; `current_token` stays valid.
pub async fn change_password(
    state: &AppState,
    user: &User,
    current_token: Option<&str>,
    current_password: &str,
    new_password: &str,
) -> Result<()> {
    let stored = state
        .db
        .password_hash(&user.id)?
        .ok_or_else(|| StoreError::not_found("User"))?;
    let iterations = state.config.auth.password_iterations;
    let (current_password, new_password) = (current_password.to_string(), new_password.to_string());
    let hash = blocking(move || {
        if !verify_password(&current_password, &stored) {
            return Err(StoreError::validation("Current password is incorrect"));
        }
        validation::check_password(&new_password)?;
        hash_password(&new_password, iterations)
    })
    .await?;

    state.db.set_password_hash(&user.id, &hash)?;
    let keep = current_token.map(|t| sha256_hex(t.as_bytes()));
    let revoked = state.db.delete_user_sessions(&user.id, keep.as_deref())?;
    info!("Password changed for user {}, revoked {} session(s)", user.id, revoked);
    Ok(())
}
