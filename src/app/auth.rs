use super::{blocking, validation};
use crate::crypto::{decoy_hash, hash_password, random_token, sha256_hex, verify_password};
use crate::error::{Result, StoreError};
use crate::metrics::{self, MetricName};
use crate::state::AppState;
use crate::types::{Role, Session, User};
use chrono::{Duration, Utc};
use tracing::{info, warn};

pub async fn register(state: &AppState, email: &str, password: &str, name: &str) -> Result<Session> {
    let email = validation::normalize_email(email)?;
    validation::check_password(password)?;
    let name = validation::name(name)?;

    let iterations = state.config.auth.password_iterations;
    let password = password.to_string();
    let hash = blocking(move || hash_password(&password, iterations)).await?;
    let user = state.db.insert_user(&email, &name, &hash, Role::Customer)?;
    info!("Registered user {}", user.id);
    metrics::increment(MetricName::UsersRegistered);
    start_session(state, user)
}

pub async fn login(state: &AppState, email: &str, password: &str) -> Result<Session> {
    let email = email.trim().to_lowercase();
    let credentials = state.db.find_user_credentials(&email)?;
    let iterations = state.config.auth.password_iterations;
    let password = password.to_string();
    let user = blocking(move || check_credentials(credentials, &password, iterations)).await?;
    if user.banned {
        return Err(StoreError::Forbidden("This account has been suspended".into()));
    }
    metrics::increment(MetricName::LoginsSuccess);
    start_session(state, user)
}

/// Unknown email and wrong password fail identically, and both pay for one
/// key derivation.
fn check_credentials(
    credentials: Option<(User, String)>,
    password: &str,
    iterations: u32,
) -> Result<User> {
    let Some((user, stored_hash)) = credentials else {
        let _ = verify_password(password, &decoy_hash(iterations));
        metrics::increment(MetricName::LoginsFailed);
        return Err(StoreError::Unauthorized);
    };
    if !verify_password(password, &stored_hash) {
        metrics::increment(MetricName::LoginsFailed);
        warn!("Failed login for user {}", user.id);
        return Err(StoreError::Unauthorized);
    }
    Ok(user)
}

pub fn logout(state: &AppState, token: &str) -> Result<()> {
    state.db.delete_session(&sha256_hex(token.as_bytes()))
}

/// Resolve a bearer token to its user.
pub fn authenticate(state: &AppState, token: &str) -> Result<User> {
    let token_hash = sha256_hex(token.as_bytes());
    let Some((user_id, expires_at)) = state.db.find_session(&token_hash)? else {
        return Err(StoreError::Unauthorized);
    };
    if expires_at <= Utc::now() {
        state.db.delete_session(&token_hash)?;
        return Err(StoreError::Unauthorized);
    }
    let user = state.db.get_user(&user_id)?.ok_or(StoreError::Unauthorized)?;
    if user.banned {
        return Err(StoreError::Forbidden("This account has been suspended".into()));
    }
    Ok(user)
}

/// Only the token's hash is stored.
pub(crate) fn start_session(state: &AppState, user: User) -> Result<Session> {
    let token = random_token();
    let expires_at = Utc::now() + Duration::days(state.config.auth.session_ttl_days);
    state
        .db
        .insert_session(&sha256_hex(token.as_bytes()), &user.id, &expires_at)?;
    Ok(Session {
        token,
        user,
        expires_at,
    })
}
