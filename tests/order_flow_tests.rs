mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{address, TestApp, WEBHOOK_SECRET};
use serde_json::{json, Value};
use tresses::crypto::sign;

async fn confirm(app: &TestApp, payload: &Value, secret: &str) -> (StatusCode, Value) {
    let body = payload.to_string();
    let signature = sign(secret, body.as_bytes()).unwrap();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/payments/confirm")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-payment-signature", signature)
        .body(Body::from(body))
        .unwrap();
    let response = app.send(request).await;
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn payment(order: &Value, reference: &str) -> Value {
    json!({
        "order_id": order["id"],
        "payment_reference": reference,
        "amount_cents": order["total_cents"],
    })
}

#[tokio::test]
async fn test_cart_quantity_rules() {
    let app = TestApp::new();
    let product = app.product("Curl Cream", 1800, 3);
    let token = app.register("cart@example.com").await;

    let (status, cart) = app
        .post(
            "/api/cart/items",
            Some(&token),
            json!({ "product_id": product.id, "quantity": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["item_count"], 2);
    assert_eq!(cart["subtotal_cents"], 3600);

    // 2 + 2 exceeds the 3 in stock.
    let (status, _) = app
        .post(
            "/api/cart/items",
            Some(&token),
            json!({ "product_id": product.id, "quantity": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let uri = format!("/api/cart/items/{}", product.id);
    let (status, cart) = app
        .call(Method::PUT, &uri, Some(&token), Some(json!({ "quantity": 1 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["item_count"], 1);

    let (status, cart) = app
        .call(Method::PUT, &uri, Some(&token), Some(json!({ "quantity": 0 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["lines"], json!([]));
}

#[tokio::test]
async fn test_checkout_totals_reserve_stock_and_clear_cart() {
    let app = TestApp::new();
    let product = app.product("Curl Cream", 1200, 10);
    let token = app.register("buyer@example.com").await;

    let order = app.place_order(&token, &product, 2).await;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["subtotal_cents"], 2400);
    assert_eq!(order["shipping_cents"], 599);
    assert_eq!(order["tax_cents"], 192);
    assert_eq!(order["total_cents"], 3191);
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(order["shipping_address"]["city"], "Portland");
    assert_eq!(app.stock_of(&product.id), 8);

    let (_, cart) = app.get("/api/cart", Some(&token)).await;
    assert_eq!(cart["item_count"], 0);

    let (_, notifications) = app
        .get("/api/admin/notifications", Some(&app.admin().await))
        .await;
    assert!(notifications["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["kind"] == "order_created"));
}

#[tokio::test]
async fn test_checkout_requires_items_and_address() {
    let app = TestApp::new();
    let token = app.register("empty@example.com").await;

    let (status, _) = app
        .post("/api/checkout", Some(&token), json!({ "address": address() }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let product = app.product("Gel", 900, 5);
    app.post(
        "/api/cart/items",
        Some(&token),
        json!({ "product_id": product.id, "quantity": 1 }),
    )
    .await;
    let (status, _) = app.post("/api/checkout", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .post(
            "/api/checkout",
            Some(&token),
            json!({ "address_id": "someone-elses-address" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_with_saved_address() {
    let app = TestApp::new();
    let token = app.register("saved@example.com").await;
    let (status, saved) = app.post("/api/addresses", Some(&token), address()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(saved["is_default"], true);

    let product = app.product("Oil", 5000, 2);
    app.post(
        "/api/cart/items",
        Some(&token),
        json!({ "product_id": product.id, "quantity": 1 }),
    )
    .await;
    let (status, order) = app
        .post(
            "/api/checkout",
            Some(&token),
            json!({ "address_id": saved["id"], "notes": "Leave by the door" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["shipping_cents"], 0);
    assert_eq!(order["notes"], "Leave by the door");
    assert_eq!(order["shipping_address"]["recipient"], "Ada Lovelace");
}

#[tokio::test]
async fn test_payment_confirmation_marks_paid_once() {
    let app = TestApp::new();
    let product = app.product("Serum", 2000, 5);
    let token = app.register("payer@example.com").await;
    let order = app.place_order(&token, &product, 1).await;

    let (status, paid) = confirm(&app, &payment(&order, "pay_123"), WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "paid");
    assert_eq!(paid["payment_reference"], "pay_123");
    assert!(paid["paid_at"].is_string());

    // Replay is a no-op.
    let (status, replay) = confirm(&app, &payment(&order, "pay_123"), WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["paid_at"], paid["paid_at"]);

    let confirmations = app.mail.sent_to("payer@example.com");
    assert_eq!(confirmations.len(), 1);
    assert!(confirmations[0].subject.contains(order["order_number"].as_str().unwrap()));
}

#[tokio::test]
async fn test_payment_rejects_bad_signature_and_wrong_amount() {
    let app = TestApp::new();
    let product = app.product("Serum", 2000, 5);
    let token = app.register("fraud@example.com").await;
    let order = app.place_order(&token, &product, 1).await;

    let (status, _) = confirm(&app, &payment(&order, "pay_x"), "not-the-secret").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut short = payment(&order, "pay_x");
    short["amount_cents"] = json!(1);
    let (status, _) = confirm(&app, &short, WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, detail) = app
        .get(&format!("/api/orders/{}", order["id"].as_str().unwrap()), Some(&token))
        .await;
    assert_eq!(detail["status"], "pending");
}

#[tokio::test]
async fn test_customer_cancel_restocks_and_is_final() {
    let app = TestApp::new();
    let product = app.product("Mask", 1500, 4);
    let token = app.register("cancel@example.com").await;
    let order = app.place_order(&token, &product, 3).await;
    assert_eq!(app.stock_of(&product.id), 1);

    let uri = format!("/api/orders/{}/cancel", order["id"].as_str().unwrap());
    let (status, cancelled) = app.post(&uri, Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(app.stock_of(&product.id), 4);

    let (status, body) = app.post(&uri, Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");
}

#[tokio::test]
async fn test_admin_cancel_from_processing_restocks() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let product = app.product("Steamer Cap", 2200, 5);
    let token = app.register("late-cancel@example.com").await;
    let order = app.place_order(&token, &product, 2).await;
    let id = order["id"].as_str().unwrap();
    confirm(&app, &payment(&order, "pay_late"), WEBHOOK_SECRET).await;

    let status_uri = format!("/api/admin/orders/{id}/status");
    let (status, _) = app
        .post(&status_uri, Some(&admin), json!({ "status": "processing" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.stock_of(&product.id), 3);

    // Too late for the customer, not for an admin.
    let (status, _) = app
        .post(&format!("/api/orders/{id}/cancel"), Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, cancelled) = app
        .post(
            &status_uri,
            Some(&admin),
            json!({ "status": "cancelled", "note": "Out of packaging" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(app.stock_of(&product.id), 5);

    let (_, detail) = app
        .get(&format!("/api/admin/orders/{id}"), Some(&admin))
        .await;
    let last = detail["events"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["from_status"], "processing");
    assert_eq!(last["to_status"], "cancelled");
    assert_eq!(last["note"], "Out of packaging");
    assert!(app
        .mail
        .sent_to("late-cancel@example.com")
        .iter()
        .any(|e| e.subject.to_lowercase().contains("cancel")));
}

#[tokio::test]
async fn test_orders_are_private() {
    let app = TestApp::new();
    let product = app.product("Mask", 1500, 4);
    let owner = app.register("owner@example.com").await;
    let stranger = app.register("stranger@example.com").await;
    let order = app.place_order(&owner, &product, 1).await;
    let uri = format!("/api/orders/{}", order["id"].as_str().unwrap());

    assert_eq!(app.get(&uri, Some(&stranger)).await.0, StatusCode::NOT_FOUND);
    let (status, detail) = app.get(&uri, Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["events"][0]["to_status"], "pending");

    let (_, mine) = app.get("/api/orders", Some(&owner)).await;
    assert_eq!(mine["total"], 1);
    let (_, theirs) = app.get("/api/orders", Some(&stranger)).await;
    assert_eq!(theirs["total"], 0);
}

#[tokio::test]
async fn test_fulfilment_path_emails_customer() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let product = app.product("Comb", 800, 10);
    let token = app.register("ship@example.com").await;
    let order = app.place_order(&token, &product, 1).await;
    let id = order["id"].as_str().unwrap();
    confirm(&app, &payment(&order, "pay_ship"), WEBHOOK_SECRET).await;

    let status_uri = format!("/api/admin/orders/{id}/status");
    let (status, _) = app
        .post(&status_uri, Some(&admin), json!({ "status": "processing" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, shipped) = app
        .post(
            &status_uri,
            Some(&admin),
            json!({ "status": "shipped", "tracking_number": "1Z999" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shipped["tracking_number"], "1Z999");

    // Skipping back is refused.
    let (status, _) = app
        .post(&status_uri, Some(&admin), json!({ "status": "paid" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let emails = app.mail.sent_to("ship@example.com");
    assert!(emails.iter().any(|e| e.text.contains("1Z999")));

    // Refunds do not restock.
    let (status, _) = app
        .post(&status_uri, Some(&admin), json!({ "status": "refunded" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.stock_of(&product.id), 9);
}

#[tokio::test]
async fn test_wishlist_move_to_cart() {
    let app = TestApp::new();
    let product = app.product("Bonnet", 1100, 2);
    let token = app.register("wish@example.com").await;

    let (status, list) = app
        .post("/api/wishlist", Some(&token), json!({ "product_id": product.id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, cart) = app
        .post(
            &format!("/api/wishlist/{}/move-to-cart", product.id),
            Some(&token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["item_count"], 1);
    let (_, list) = app.get("/api/wishlist", Some(&token)).await;
    assert_eq!(list, json!([]));

    let (status, _) = app
        .post("/api/wishlist", Some(&token), json!({ "product_id": "missing" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_default_address_moves() {
    let app = TestApp::new();
    let token = app.register("addr@example.com").await;
    let (status, first) = app.post("/api/addresses", Some(&token), address()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["is_default"], true);
    let mut other = address();
    other["city"] = json!("Seattle");
    let (_, second) = app.post("/api/addresses", Some(&token), other).await;
    assert_eq!(second["is_default"], false);

    let (status, list) = app
        .post(
            &format!("/api/addresses/{}/default", second["id"].as_str().unwrap()),
            Some(&token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let defaults: Vec<&Value> = list
        .as_array()
        .unwrap()
        .iter()
        .filter(|a| a["is_default"] == true)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["id"], second["id"]);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/addresses/{}", first["id"].as_str().unwrap()),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_deleting_default_address_promotes_newest() {
    let app = TestApp::new();
    let token = app.register("move@example.com").await;
    let mut ids = Vec::new();
    for city in ["Denver", "Boise", "Tulsa"] {
        let mut body = address();
        body["city"] = json!(city);
        let (_, created) = app.post("/api/addresses", Some(&token), body).await;
        assert_eq!(created["is_default"], ids.is_empty());
        ids.push(created["id"].as_str().unwrap().to_string());
    }

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/addresses/{}", ids[0]),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = app.get("/api/addresses", Some(&token)).await;
    let defaults: Vec<&Value> = list
        .as_array()
        .unwrap()
        .iter()
        .filter(|a| a["is_default"] == true)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["city"], "Tulsa");
}
