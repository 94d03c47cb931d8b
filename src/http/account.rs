use super::extract::{CurrentUser, SessionToken};
use crate::app::account::{self, ProfileUpdate};
use crate::app::auth;
use crate::config::Config;
use crate::error::Result;
use crate::state::AppState;
use crate::types::{Session, User};
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

fn session_cookie(config: &Config, session: &Session) -> HeaderMap {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        config.auth.cookie_name, session.token, max_age
    );
    cookie_headers(cookie)
}

fn cookie_headers(cookie: String) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(header::SET_COOKIE, value);
    }
    headers
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Session>)> {
    let session = auth::register(&state, &request.email, &request.password, &request.name).await?;
    let headers = session_cookie(&state.config, &session);
    Ok((StatusCode::CREATED, headers, Json(session)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<Session>)> {
    let session = auth::login(&state, &request.email, &request.password).await?;
    let headers = session_cookie(&state.config, &session);
    Ok((headers, Json(session)))
}

/// Always clears the cookie, even without a live session.
pub async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<(StatusCode, HeaderMap)> {
    if let Some(token) = token {
        auth::logout(&state, &token)?;
    }
    let cleared = format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        state.config.auth.cookie_name
    );
    Ok((StatusCode::NO_CONTENT, cookie_headers(cleared)))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    account::update_profile(&state, &user, &update).map(Json)
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    SessionToken(token): SessionToken,
    Json(change): Json<PasswordChange>,
) -> Result<StatusCode> {
    account::change_password(
        &state,
        &user,
        token.as_deref(),
        &change.current_password,
        &change.new_password,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
