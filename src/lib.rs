pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod graphql;
pub mod logging;
pub mod metrics;
pub mod order_status;
pub mod rate_limiter;
pub mod server;
pub mod state;
pub mod types;

// Use cases, their HTTP surface, and outbound adapters
pub mod app;
pub mod http;
pub mod infra;

// Admin fan-out of store events
pub mod notify;
