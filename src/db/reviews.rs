use super::{get_ts, is_unique_violation, new_id, ts, Database};
use crate::error::{Result, StoreError};
use crate::types::{PageRequest, Review};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

const REVIEW_SELECT: &str = "SELECT r.id, r.product_id, r.user_id, u.name, r.rating, r.title, r.body, \
     r.verified_purchase, r.created_at FROM reviews r JOIN users u ON u.id = r.user_id";

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        product_id: row.get(1)?,
        user_id: row.get(2)?,
        author_name: row.get(3)?,
        rating: row.get(4)?,
        title: row.get(5)?,
        body: row.get(6)?,
        verified_purchase: row.get(7)?,
        created_at: get_ts(row, 8)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewReview<'a> {
    pub product_id: &'a str,
    pub user_id: &'a str,
    pub rating: i64,
    pub title: &'a str,
    pub body: &'a str,
    pub verified_purchase: bool,
}

impl Database {
    pub fn insert_review(&self, new: &NewReview<'_>) -> Result<Review> {
        let id = new_id();
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO reviews (id, product_id, user_id, rating, title, body, verified_purchase, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    new.product_id,
                    new.user_id,
                    new.rating,
                    new.title,
                    new.body,
                    new.verified_purchase,
                    ts(&Utc::now())
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::conflict("You have already reviewed this product")
                } else {
                    e.into()
                }
            })?;
        }
        self.get_review(&id)?
            .ok_or_else(|| StoreError::not_found("Review"))
    }

    pub fn get_review(&self, id: &str) -> Result<Option<Review>> {
        let conn = self.conn()?;
        let review = conn
            .query_row(&format!("{REVIEW_SELECT} WHERE r.id = ?1"), params![id], review_from_row)
            .optional()?;
        Ok(review)
    }

    pub fn has_reviewed(&self, user_id: &str, product_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM reviews WHERE user_id = ?1 AND product_id = ?2",
                params![user_id, product_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(found)
    }

    /// Newest first.
    pub fn list_reviews(&self, product_id: &str, page: PageRequest) -> Result<(Vec<Review>, i64)> {
        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reviews WHERE product_id = ?1",
            params![product_id],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(&format!(
            "{REVIEW_SELECT} WHERE r.product_id = ?1 ORDER BY r.created_at DESC, r.id LIMIT ?2 OFFSET ?3"
        ))?;
        let reviews = stmt
            .query_map(params![product_id, page.limit(), page.offset()], review_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((reviews, total))
    }

    pub fn delete_review(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM reviews WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}
