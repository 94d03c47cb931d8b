mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::TestApp;
use serde_json::json;

fn token_from(url_text: &str) -> String {
    let start = url_text.find("token=").unwrap() + "token=".len();
    url_text[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

#[tokio::test]
async fn test_subscribe_is_idempotent_and_unsubscribe_works() {
    let app = TestApp::new();
    let (status, sub) = app
        .post(
            "/api/newsletter/subscribe",
            None,
            json!({ "email": "News@Example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sub["email"], "news@example.com");
    assert!(sub.get("unsubscribe_token").is_none());

    app.post(
        "/api/newsletter/subscribe",
        None,
        json!({ "email": "news@example.com" }),
    )
    .await;
    let welcomes = app.mail.sent_to("news@example.com");
    assert_eq!(welcomes.len(), 1);

    let token = token_from(&welcomes[0].text);
    let (status, _) = app
        .get(&format!("/api/newsletter/unsubscribe?token={token}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.state.db.count_active_subscribers().unwrap(), 0);

    let (status, _) = app
        .post(
            "/api/newsletter/unsubscribe",
            None,
            json!({ "token": "not-a-token" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Coming back sends a fresh welcome.
    app.post(
        "/api/newsletter/subscribe",
        None,
        json!({ "email": "news@example.com" }),
    )
    .await;
    assert_eq!(app.mail.sent_to("news@example.com").len(), 2);
    assert_eq!(app.state.db.count_active_subscribers().unwrap(), 1);
}

#[tokio::test]
async fn test_campaign_reaches_active_subscribers_only() {
    let app = TestApp::new();
    let admin = app.admin().await;
    for email in ["a@example.com", "b@example.com", "gone@example.com"] {
        app.post("/api/newsletter/subscribe", None, json!({ "email": email }))
            .await;
    }
    let gone = token_from(&app.mail.sent_to("gone@example.com")[0].text);
    app.post("/api/newsletter/unsubscribe", None, json!({ "token": gone }))
        .await;

    let (status, result) = app
        .post(
            "/api/admin/newsletter/campaigns",
            Some(&admin),
            json!({ "subject": "Spring edit", "body": "New curl creams are in." }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result, json!({ "sent": 2, "failed": 0 }));
    assert!(app
        .mail
        .sent_to("gone@example.com")
        .iter()
        .all(|e| e.subject != "Spring edit"));

    let (_, active) = app
        .get("/api/admin/newsletter/subscribers?active=true", Some(&admin))
        .await;
    assert_eq!(active["total"], 2);

    let request = Request::builder()
        .uri("/api/admin/newsletter/subscribers/export")
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let csv = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let csv = String::from_utf8(csv.to_vec()).unwrap();
    assert!(csv.contains("gone@example.com"));
    assert_eq!(csv.split("\r\n").filter(|l| !l.is_empty()).count(), 4);
}

#[tokio::test]
async fn test_guest_and_customer_complaints() {
    let app = TestApp::new();
    let admin = app.admin().await;

    let (status, guest) = app
        .post(
            "/api/complaints",
            None,
            json!({
                "email": "guest@example.com",
                "subject": "Leaky bottle",
                "message": "The pump leaked all over the box."
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(guest["status"], "open");

    // Guests cannot reference orders.
    let (status, _) = app
        .post(
            "/api/complaints",
            None,
            json!({
                "email": "guest@example.com",
                "order_id": "some-order",
                "subject": "Late",
                "message": "Where is my parcel please?"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let product = app.product("Gel", 1000, 5);
    let token = app.register("member@example.com").await;
    let order = app.place_order(&token, &product, 1).await;
    let (status, mine) = app
        .post(
            "/api/complaints",
            Some(&token),
            json!({
                "order_id": order["id"],
                "subject": "Wrong scent",
                "message": "I ordered unscented but got lavender."
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(mine["email"], "member@example.com");

    let (_, listed) = app.get("/api/complaints", Some(&token)).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (_, open) = app
        .get("/api/admin/complaints?status=open", Some(&admin))
        .await;
    assert_eq!(open["total"], 2);

    let (_, notifications) = app.get("/api/admin/notifications", Some(&admin)).await;
    let complaint_alerts = notifications["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["kind"] == "complaint_received")
        .count();
    assert_eq!(complaint_alerts, 2);
}

#[tokio::test]
async fn test_admin_response_is_emailed() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (_, complaint) = app
        .post(
            "/api/complaints",
            None,
            json!({
                "email": "reply@example.com",
                "subject": "Damaged comb",
                "message": "Two teeth were snapped on arrival."
            }),
        )
        .await;
    let uri = format!("/api/admin/complaints/{}", complaint["id"].as_str().unwrap());

    let (status, _) = app
        .call(Method::PATCH, &uri, Some(&admin), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, updated) = app
        .call(
            Method::PATCH,
            &uri,
            Some(&admin),
            Some(json!({ "status": "resolved", "admin_response": "A replacement is on its way." })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "resolved");

    let replies = app.mail.sent_to("reply@example.com");
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].subject, "Re: Damaged comb");
    assert!(replies[0].text.contains("replacement"));
}
