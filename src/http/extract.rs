//! Session extractors. The token comes from `Authorization: Bearer` or,
//! failing that, the session cookie.

use crate::app::auth;
use crate::error::StoreError;
use crate::state::AppState;
use crate::types::User;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// The raw session token, if the request carries one.
pub struct SessionToken(pub Option<String>);

#[async_trait]
impl FromRequestParts<AppState> for SessionToken {
    type Rejection = StoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(SessionToken(session_token(&parts.headers, &state.config.auth.cookie_name)))
    }
}

/// A signed-in user. Rejects with 401 when there is no valid session.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = StoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(StoreError::Unauthorized)?;
        auth::authenticate(state, &token).map(CurrentUser)
    }
}

/// A user if signed in. Invalid or expired sessions count as anonymous.
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = StoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers, &state.config.auth.cookie_name) else {
            return Ok(MaybeUser(None));
        };
        match auth::authenticate(state, &token) {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(StoreError::Unauthorized) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// A signed-in admin. Non-admins get 403.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = StoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(StoreError::Forbidden("Administrator access required".into()));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("tresses_session=xyz"));
        assert_eq!(session_token(&headers, "tresses_session").as_deref(), Some("abc"));
    }

    #[test]
    fn test_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; tresses_session=xyz; other=1"),
        );
        assert_eq!(session_token(&headers, "tresses_session").as_deref(), Some("xyz"));
        assert_eq!(session_token(&headers, "missing"), None);
    }
}
