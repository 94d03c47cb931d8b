mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_listing_filters_and_sorts() {
    let app = TestApp::new();
    app.product("Curl Cream", 1800, 5);
    app.product("Shine Serum", 2600, 0);
    app.product("Curl Gel", 1200, 9);

    let (status, page) = app.get("/api/products?q=curl&sort=price_asc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    let names: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Curl Gel", "Curl Cream"]);

    let (_, in_stock) = app.get("/api/products?in_stock=true", None).await;
    assert_eq!(in_stock["total"], 2);

    let (_, priced) = app
        .get("/api/products?min_price=1500&max_price=2000", None)
        .await;
    assert_eq!(priced["total"], 1);
    assert_eq!(priced["items"][0]["name"], "Curl Cream");
}

#[tokio::test]
async fn test_inverted_price_range_is_rejected() {
    let app = TestApp::new();
    let (status, _) = app
        .get("/api/products?min_price=3000&max_price=1000", None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_product_detail_and_missing_slug() {
    let app = TestApp::new();
    let product = app.product("Edge Control", 999, 3);
    assert_eq!(product.slug, "edge-control");

    let (status, detail) = app.get("/api/products/edge-control", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Edge Control");
    assert_eq!(detail["rating"]["count"], 0);

    let (status, body) = app.get("/api/products/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_duplicate_names_get_distinct_slugs() {
    let app = TestApp::new();
    let first = app.product("Leave-In", 1500, 1);
    let second = app.product("Leave In", 1500, 1);
    assert_eq!(first.slug, "leave-in");
    assert_eq!(second.slug, "leave-in-2");
}

#[tokio::test]
async fn test_inactive_products_are_hidden() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let product = app.product("Retired Tonic", 1000, 4);
    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/api/admin/products/{}", product.id),
            Some(&admin),
            Some(json!({ "active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        app.get("/api/products/retired-tonic", None).await.0,
        StatusCode::NOT_FOUND
    );
    let (_, admin_list) = app.get("/api/admin/products", Some(&admin)).await;
    assert_eq!(admin_list["total"], 1);
}

#[tokio::test]
async fn test_categories_count_active_products() {
    let app = TestApp::new();
    app.product("A", 100, 1);
    app.product("B", 100, 1);
    let (status, categories) = app.get("/api/categories", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(categories, json!([{ "name": "styling", "product_count": 2 }]));
}

#[tokio::test]
async fn test_reviews_once_per_customer_with_verified_flag() {
    let app = TestApp::new();
    app.product("Bond Builder", 3000, 10);
    let token = app.register("reviewer@example.com").await;
    let review = json!({ "rating": 5, "title": "Great", "body": "My curls have never been happier." });

    let (status, created) = app
        .post("/api/products/bond-builder/reviews", Some(&token), review.clone())
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["verified_purchase"], false);

    let (status, _) = app
        .post("/api/products/bond-builder/reviews", Some(&token), review)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, bad) = app
        .post(
            "/api/products/bond-builder/reviews",
            Some(&token),
            json!({ "rating": 6, "title": "Too much", "body": "Six stars is not a thing." }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{bad}");

    let (_, detail) = app.get("/api/products/bond-builder", None).await;
    assert_eq!(detail["rating"]["count"], 1);
    assert_eq!(detail["rating"]["average"], 5.0);

    let (_, reviews) = app.get("/api/products/bond-builder/reviews", None).await;
    assert_eq!(reviews["items"][0]["author_name"], "Test Customer");

    // Someone else cannot delete it.
    let other = app.register("other@example.com").await;
    let id = created["id"].as_str().unwrap();
    let (status, _) = app
        .call(Method::DELETE, &format!("/api/reviews/{id}"), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .call(Method::DELETE, &format!("/api/reviews/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_graphql_products_query() {
    let app = TestApp::new();
    app.product("Curl Cream", 1899, 5);
    let (status, body) = app
        .post(
            "/graphql",
            None,
            json!({ "query": "{ products(limit: 5) { name price inStock rating { count } } categories { name productCount } }" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["products"][0]["name"], "Curl Cream");
    assert_eq!(body["data"]["products"][0]["price"], "$18.99");
    assert_eq!(body["data"]["products"][0]["inStock"], true);
    assert_eq!(body["data"]["categories"][0]["productCount"], 1);
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
