use crate::error::StoreError;
use crate::metrics::{increment_labeled, MetricName};
use crate::rate_limiter::Decision;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::debug;

/// Best-effort client address for rate limiting.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit<B>(
    State(state): State<AppState>,
    request: Request<B>,
    next: Next<B>,
) -> Response {
    let path = request.uri().path();
    let (limiter, scope) = if path.starts_with("/api/auth/") {
        (&state.auth_limiter, "auth")
    } else if path.starts_with("/api/") {
        (&state.api_limiter, "api")
    } else {
        return next.run(request).await;
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);
    let key = format!("{}:{}", scope, ip);

    match limiter.check(&key) {
        Decision::Limited { retry_after_secs } => {
            debug!(%ip, scope, retry_after_secs, "rate limited");
            increment_labeled(MetricName::RateLimited, "scope", scope.to_string());
            StoreError::RateLimited { retry_after_secs }.into_response()
        }
        Decision::Allowed { remaining } => {
            let limit = limiter.limit();
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "10.0.0.9:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.2"));
        assert_eq!(client_ip(&headers, Some(peer)), "192.168.1.2");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.5");
    }
}
