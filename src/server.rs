use crate::graphql::{create_schema, GraphQLSchema};
use crate::http::{account, admin, middleware::rate_limit, public, shop, storefront};
use crate::state::AppState;
use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    response::{Html, IntoResponse, Json},
    routing::{delete, get, patch, post, put},
    Extension, Router,
};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use hyper::Server;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "tresses",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GraphQL handler (supports GET and POST)
async fn graphql_handler(
    Extension(schema): Extension<GraphQLSchema>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

/// GraphiQL UI (pinned CDN versions)
async fn graphiql() -> impl IntoResponse {
    let html = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Tresses catalog explorer</title>
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/graphiql@2.7.5/graphiql.min.css" />
    <style>
      html, body, #graphiql { height: 100%; margin: 0; width: 100%; }
    </style>
  </head>
  <body>
    <div id="graphiql"></div>
    <script crossorigin src="https://cdn.jsdelivr.net/npm/react@18/umd/react.production.min.js"></script>
    <script crossorigin src="https://cdn.jsdelivr.net/npm/react-dom@18/umd/react-dom.production.min.js"></script>
    <script crossorigin src="https://cdn.jsdelivr.net/npm/graphiql@2.7.5/graphiql.min.js"></script>
    <script>
      const fetcher = GraphiQL.createFetcher({ url: '/graphql' });
      const defaultQuery = '{\n  products(limit: 5) {\n    name\n    price\n    rating { average count }\n  }\n}\n';
      ReactDOM.createRoot(document.getElementById('graphiql'))
        .render(React.createElement(GraphiQL, { fetcher, defaultQuery }));
    </script>
  </body>
</html>"#;
    Html(html)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
    ];
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn storefront_routes() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(storefront::list_products))
        .route("/api/products/:slug", get(storefront::get_product))
        .route("/api/categories", get(storefront::categories))
        .route(
            "/api/products/:slug/reviews",
            get(storefront::list_reviews).post(storefront::submit_review),
        )
        .route("/api/reviews/:id", delete(storefront::delete_review))
}

fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(account::register))
        .route("/api/auth/login", post(account::login))
        .route("/api/auth/logout", post(account::logout))
        .route("/api/account", get(account::me).patch(account::update_profile))
        .route("/api/account/password", post(account::change_password))
        .route(
            "/api/addresses",
            get(shop::list_addresses).post(shop::create_address),
        )
        .route(
            "/api/addresses/:id",
            put(shop::update_address).delete(shop::delete_address),
        )
        .route("/api/addresses/:id/default", post(shop::set_default_address))
}

fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cart", get(shop::get_cart).delete(shop::clear_cart))
        .route("/api/cart/items", post(shop::add_to_cart))
        .route(
            "/api/cart/items/:product_id",
            put(shop::set_cart_quantity).delete(shop::remove_from_cart),
        )
        .route("/api/checkout", post(shop::checkout))
        .route("/api/payments/confirm", post(shop::confirm_payment))
        .route("/api/orders", get(shop::list_orders))
        .route("/api/orders/:id", get(shop::get_order))
        .route("/api/orders/:id/cancel", post(shop::cancel_order))
        .route(
            "/api/wishlist",
            get(shop::get_wishlist).post(shop::add_to_wishlist),
        )
        .route("/api/wishlist/:product_id", delete(shop::remove_from_wishlist))
        .route(
            "/api/wishlist/:product_id/move-to-cart",
            post(shop::move_to_cart),
        )
        .route("/api/newsletter/subscribe", post(public::subscribe))
        .route(
            "/api/newsletter/unsubscribe",
            post(public::unsubscribe).get(public::unsubscribe_link),
        )
        .route(
            "/api/complaints",
            get(public::my_complaints).post(public::submit_complaint),
        )
}

fn admin_routes(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route("/api/admin/products/bulk", post(admin::bulk_products))
        .route(
            "/api/admin/products/:id",
            get(admin::get_product)
                .patch(admin::update_product)
                .delete(admin::delete_product),
        )
        .route("/api/admin/products/:id/stock", post(admin::adjust_stock))
        .route("/api/admin/orders", get(admin::list_orders))
        .route("/api/admin/orders/export", get(admin::export_orders))
        .route("/api/admin/orders/bulk/status", post(admin::bulk_order_status))
        .route("/api/admin/orders/bulk/delete", post(admin::bulk_delete_orders))
        .route("/api/admin/orders/:id", get(admin::get_order))
        .route("/api/admin/orders/:id/status", post(admin::update_order_status))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/bulk", post(admin::bulk_users))
        .route(
            "/api/admin/users/:id",
            get(admin::get_user).delete(admin::delete_user),
        )
        .route("/api/admin/users/:id/role", put(admin::set_role))
        .route("/api/admin/users/:id/ban", put(admin::set_banned))
        .route("/api/admin/newsletter/subscribers", get(admin::list_subscribers))
        .route(
            "/api/admin/newsletter/subscribers/export",
            get(admin::export_subscribers),
        )
        .route("/api/admin/newsletter/campaigns", post(admin::send_campaign))
        .route("/api/admin/complaints", get(admin::list_complaints))
        .route(
            "/api/admin/complaints/:id",
            get(admin::get_complaint).patch(admin::update_complaint),
        )
        .route("/api/admin/notifications", get(admin::list_notifications))
        .route(
            "/api/admin/notifications/read-all",
            post(admin::mark_all_notifications_read),
        )
        .route(
            "/api/admin/notifications/stream",
            get(admin::notification_stream),
        )
        .route(
            "/api/admin/notifications/:id/read",
            post(admin::mark_notification_read),
        )
        .route("/api/admin/analytics", get(admin::dashboard))
        .route(
            "/api/admin/uploads",
            post(admin::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
}

/// Create the HTTP server with all routes, including GraphQL
pub fn create_server(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    let schema = create_schema(state.clone());
    let uploads = state.uploads.root().to_path_buf();

    Router::new()
        .route("/health", get(health))
        .route("/graphql", post(graphql_handler).get(graphql_handler))
        .route("/graphiql", get(graphiql))
        .merge(storefront_routes())
        .merge(account_routes())
        .merge(shop_routes())
        .merge(admin_routes(state.uploads.max_bytes()))
        .nest_service("/uploads", ServeDir::new(uploads))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(Extension(schema))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{port}");
    info!("Health check: http://localhost:{port}/health");
    info!("GraphiQL UI:  http://localhost:{port}/graphiql");

    Server::try_bind(&addr)
        .with_context(|| format!("failed to bind {}", addr))?
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}
