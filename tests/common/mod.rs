#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;
use tresses::{
    app::admin::{self, ProductInput},
    app::setup,
    config::Config,
    db::Database,
    error::Result,
    infra::mailer::{Email, Mailer},
    infra::push::NoopPushPublisher,
    server::create_server,
    state::AppState,
    types::Product,
};

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const PASSWORD: &str = "hunter2hunter2";

#[derive(Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<Email>>,
}

impl CapturingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, to: &str) -> Vec<Email> {
        self.sent().into_iter().filter(|e| e.to == to).collect()
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub mail: Arc<CapturingMailer>,
    _uploads: TempDir,
}

pub fn test_config(uploads: &TempDir) -> Config {
    let mut config = Config::default();
    config.auth.password_iterations = 1_000;
    config.payments.webhook_secret = WEBHOOK_SECRET.to_string();
    config.uploads.dir = uploads.path().to_string_lossy().into_owned();
    config.uploads.max_bytes = 64 * 1024;
    config.rate_limit.api.limit = 10_000;
    config.rate_limit.auth.limit = 10_000;
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let mut config = test_config(&uploads);
        adjust(&mut config);
        let mail = Arc::new(CapturingMailer::default());
        let state = AppState::with_services(
            Database::open_in_memory().unwrap(),
            config,
            mail.clone(),
            Arc::new(NoopPushPublisher),
        );
        Self {
            router: create_server(state.clone()),
            state,
            mail,
            _uploads: uploads,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// JSON request; returns the status and the parsed body (Null when empty).
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self.send(builder.body(body).unwrap()).await;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    /// Registers a customer and returns their bearer token.
    pub async fn register(&self, email: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                serde_json::json!({ "email": email, "password": PASSWORD, "name": "Test Customer" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Creates an admin and returns their bearer token.
    pub async fn admin(&self) -> String {
        setup::create_admin(&self.state, "admin@tresses.test", PASSWORD, "Admin").unwrap();
        let (status, body) = self
            .post(
                "/api/auth/login",
                None,
                serde_json::json!({ "email": "admin@tresses.test", "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    pub fn product(&self, name: &str, price_cents: i64, stock: i64) -> Product {
        admin::create_product(
            &self.state,
            &ProductInput {
                name: name.to_string(),
                description: format!("{name} for every curl pattern"),
                category: "styling".to_string(),
                hair_types: vec!["curly".to_string()],
                price_cents,
                compare_at_cents: None,
                stock,
                image_url: None,
                active: true,
            },
        )
        .unwrap()
    }

    /// Adds the product to the cart and checks out with an inline address.
    pub async fn place_order(&self, token: &str, product: &Product, quantity: i64) -> Value {
        let (status, body) = self
            .post(
                "/api/cart/items",
                Some(token),
                serde_json::json!({ "product_id": product.id, "quantity": quantity }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "add to cart failed: {body}");
        let (status, order) = self
            .post("/api/checkout", Some(token), serde_json::json!({ "address": address() }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "checkout failed: {order}");
        order
    }

    pub fn stock_of(&self, product_id: &str) -> i64 {
        self.state.db.get_product(product_id).unwrap().unwrap().stock
    }
}

pub fn address() -> Value {
    serde_json::json!({
        "recipient": "Ada Lovelace",
        "line1": "12 Curl Street",
        "city": "Portland",
        "region": "OR",
        "postal_code": "97201",
        "country": "US",
        "phone": "+1 503 555 0100"
    })
}
