use super::{ts, Database};
use crate::error::Result;
use crate::order_status::OrderStatus;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;
use serde::Serialize;
use std::collections::HashMap;

/// Statuses whose orders count as revenue, as an SQL list.
const REVENUE_STATUSES: &str = "('paid', 'processing', 'shipped', 'delivered')";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevenueSummary {
    pub revenue_cents: i64,
    pub order_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue_cents: i64,
    pub order_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProduct {
    pub product_id: Option<String>,
    pub name: String,
    pub units_sold: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewedProduct {
    pub product_id: String,
    pub slug: String,
    pub name: String,
    pub views: i64,
}

impl Database {
    pub fn revenue_summary(&self, since: &DateTime<Utc>) -> Result<RevenueSummary> {
        let conn = self.conn()?;
        let summary = conn.query_row(
            &format!(
                "SELECT COALESCE(SUM(total_cents), 0), COUNT(*) FROM orders
                 WHERE status IN {REVENUE_STATUSES} AND created_at >= ?1"
            ),
            params![ts(since)],
            |row| {
                Ok(RevenueSummary {
                    revenue_cents: row.get(0)?,
                    order_count: row.get(1)?,
                })
            },
        )?;
        Ok(summary)
    }

    /// All-time count per status; statuses with no orders report zero.
    pub fn orders_by_status(&self) -> Result<Vec<StatusCount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM orders GROUP BY status")?;
        let counts: HashMap<String, i64> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        Ok(OrderStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: *status,
                count: counts.get(status.as_str()).copied().unwrap_or(0),
            })
            .collect())
    }

    /// Revenue per UTC day for days that had counted orders. Gaps are filled by the caller.
    pub fn revenue_by_day(&self, since: &DateTime<Utc>) -> Result<Vec<DailyRevenue>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT substr(created_at, 1, 10) AS day, SUM(total_cents), COUNT(*) FROM orders
             WHERE status IN {REVENUE_STATUSES} AND created_at >= ?1
             GROUP BY day ORDER BY day"
        ))?;
        let rows = stmt
            .query_map(params![ts(since)], |row| {
                let day: String = row.get(0)?;
                Ok((day, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(day, revenue_cents, order_count)| {
                NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                    .ok()
                    .map(|date| DailyRevenue {
                        date,
                        revenue_cents,
                        order_count,
                    })
            })
            .collect())
    }

    /// Best sellers by units within counted orders. Items of deleted products
    /// are grouped under their snapshot name.
    pub fn top_products(&self, since: &DateTime<Utc>, limit: i64) -> Result<Vec<TopProduct>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT oi.product_id, MAX(oi.product_name), SUM(oi.quantity),
                    SUM(oi.quantity * oi.unit_price_cents) AS revenue
             FROM order_items oi JOIN orders o ON o.id = oi.order_id
             WHERE o.status IN {REVENUE_STATUSES} AND o.created_at >= ?1
             GROUP BY COALESCE(oi.product_id, oi.product_name)
             ORDER BY SUM(oi.quantity) DESC, revenue DESC
             LIMIT ?2"
        ))?;
        let products = stmt
            .query_map(params![ts(since), limit], |row| {
                Ok(TopProduct {
                    product_id: row.get(0)?,
                    name: row.get(1)?,
                    units_sold: row.get(2)?,
                    revenue_cents: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }

    pub fn most_viewed_products(&self, limit: i64) -> Result<Vec<ViewedProduct>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.id, p.slug, p.name, v.views FROM product_views v
             JOIN products p ON p.id = v.product_id
             WHERE v.views > 0
             ORDER BY v.views DESC, p.name COLLATE NOCASE
             LIMIT ?1",
        )?;
        let products = stmt
            .query_map(params![limit], |row| {
                Ok(ViewedProduct {
                    product_id: row.get(0)?,
                    slug: row.get(1)?,
                    name: row.get(2)?,
                    views: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(products)
    }

    pub fn count_new_customers(&self, since: &DateTime<Utc>) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'customer' AND created_at >= ?1",
            params![ts(since)],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
