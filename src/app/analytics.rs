use crate::db::analytics::{DailyRevenue, StatusCount, TopProduct, ViewedProduct};
use crate::error::{Result, StoreError};
use crate::state::AppState;
use crate::types::Product;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_DAYS: i64 = 30;
const TOP_N: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub days: i64,
    pub revenue_cents: i64,
    pub order_count: i64,
    pub average_order_cents: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub revenue_by_day: Vec<DailyRevenue>,
    pub top_products: Vec<TopProduct>,
    pub most_viewed: Vec<ViewedProduct>,
    pub new_customers: i64,
    pub low_stock: Vec<Product>,
    pub open_complaints: i64,
    pub subscriber_count: i64,
}

/// The window covers today and the `days - 1` days before it, in UTC.
pub fn dashboard(state: &AppState, days: Option<i64>) -> Result<Dashboard> {
    let days = days.unwrap_or(DEFAULT_DAYS);
    if !(1..=365).contains(&days) {
        return Err(StoreError::validation("days must be between 1 and 365"));
    }
    let today = Utc::now().date_naive();
    let first_day = today - Duration::days(days - 1);
    let since = first_day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| StoreError::Internal("invalid window start".into()))?
        .and_utc();

    let db = &state.db;
    let summary = db.revenue_summary(&since)?;
    let average_order_cents = if summary.order_count > 0 {
        summary.revenue_cents / summary.order_count
    } else {
        0
    };

    Ok(Dashboard {
        days,
        revenue_cents: summary.revenue_cents,
        order_count: summary.order_count,
        average_order_cents,
        orders_by_status: db.orders_by_status()?,
        revenue_by_day: fill_days(first_day, today, db.revenue_by_day(&since)?),
        top_products: db.top_products(&since, TOP_N)?,
        most_viewed: db.most_viewed_products(TOP_N)?,
        new_customers: db.count_new_customers(&since)?,
        low_stock: db.low_stock_products(state.config.shop.low_stock_threshold)?,
        open_complaints: db.count_open_complaints()?,
        subscriber_count: db.count_active_subscribers()?,
    })
}

/// One entry per day from `first` to `last` inclusive, zero where nothing sold.
fn fill_days(first: NaiveDate, last: NaiveDate, sparse: Vec<DailyRevenue>) -> Vec<DailyRevenue> {
    let mut by_date: HashMap<NaiveDate, DailyRevenue> =
        sparse.into_iter().map(|d| (d.date, d)).collect();
    first
        .iter_days()
        .take_while(|d| *d <= last)
        .map(|date| {
            by_date.remove(&date).unwrap_or(DailyRevenue {
                date,
                revenue_cents: 0,
                order_count: 0,
            })
        })
        .collect()
}
