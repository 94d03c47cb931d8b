mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::TestApp;
use serde_json::Value;

fn from_ip(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_api_rate_limit_returns_429_with_retry_after() {
    let app = TestApp::with_config(|config| {
        config.rate_limit.api.limit = 3;
        config.rate_limit.api.window_secs = 60;
    });

    for expected_remaining in ["2", "1", "0"] {
        let response = app.send(from_ip("/api/categories", "203.0.113.7")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "3");
        assert_eq!(response.headers()["x-ratelimit-remaining"], expected_remaining);
    }

    let response = app.send(from_ip("/api/categories", "203.0.113.7")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "rate_limited");

    // Other clients and non-API routes are unaffected.
    let response = app.send(from_ip("/api/categories", "198.51.100.1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.send(from_ip("/health", "203.0.113.7")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-ratelimit-limit").is_none());
}

#[tokio::test]
async fn test_auth_routes_use_their_own_window() {
    let app = TestApp::with_config(|config| {
        config.rate_limit.auth.limit = 2;
    });
    let login = || {
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header("x-real-ip", "192.0.2.44")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"email":"x@example.com","password":"wrong1pass"}"#))
            .unwrap()
    };
    assert_eq!(app.send(login()).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.send(login()).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.send(login()).await.status(), StatusCode::TOO_MANY_REQUESTS);

    // The general API budget is separate.
    let response = app.send(from_ip("/api/categories", "192.0.2.44")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

const PNG: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];

fn upload(token: &str, content_type: &str, bytes: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/admin/uploads")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes))
        .unwrap()
}

#[tokio::test]
async fn test_upload_stores_by_content_hash_and_serves_it() {
    let app = TestApp::new();
    let admin = app.admin().await;

    let response = app.send(upload(&admin, "image/png", PNG.to_vec())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let stored: Value = serde_json::from_slice(&body).unwrap();
    let hash = stored["sha256"].as_str().unwrap();
    let url = stored["url"].as_str().unwrap();
    assert_eq!(
        url,
        format!("/uploads/sha256/{}/{}/{}.png", &hash[..2], &hash[2..4], hash)
    );
    assert_eq!(stored["bytes"], PNG.len());

    // Same bytes, same address.
    let again = app.send(upload(&admin, "image/png", PNG.to_vec())).await;
    let again = hyper::body::to_bytes(again.into_body()).await.unwrap();
    let again: Value = serde_json::from_slice(&again).unwrap();
    assert_eq!(again["url"], stored["url"]);

    let response = app
        .send(Request::builder().uri(url).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let served = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(&served[..], PNG);
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = TestApp::new();
    let admin = app.admin().await;

    let response = app.send(upload(&admin, "text/plain", b"hello".to_vec())).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    // Declared PNG, but the bytes are not.
    let response = app
        .send(upload(&admin, "image/png", b"GIF89a not a png".to_vec()))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let mut huge = PNG.to_vec();
    huge.resize(128 * 1024, 0);
    let response = app.send(upload(&admin, "image/png", huge)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "payload_too_large");

    let customer = app.register("sneaky@example.com").await;
    let response = app.send(upload(&customer, "image/png", PNG.to_vec())).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
