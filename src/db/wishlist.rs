use super::products::{product_from_row, PRODUCT_COLUMNS, PRODUCT_COLUMN_COUNT};
use super::{get_ts, ts, Database};
use crate::error::Result;
use crate::types::WishlistEntry;
use chrono::Utc;
use rusqlite::params;

impl Database {
    /// Newest additions first.
    pub fn wishlist(&self, user_id: &str) -> Result<Vec<WishlistEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS}, w.added_at FROM wishlist_items w
             JOIN products p ON p.id = w.product_id
             WHERE w.user_id = ?1 ORDER BY w.added_at DESC, p.name"
        ))?;
        let entries = stmt
            .query_map(params![user_id], |row| {
                Ok(WishlistEntry {
                    product: product_from_row(row)?,
                    added_at: get_ts(row, PRODUCT_COLUMN_COUNT)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Adding a product that is already listed changes nothing.
    pub fn add_to_wishlist(&self, user_id: &str, product_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let added = conn.execute(
            "INSERT OR IGNORE INTO wishlist_items (user_id, product_id, added_at) VALUES (?1, ?2, ?3)",
            params![user_id, product_id, ts(&Utc::now())],
        )?;
        Ok(added > 0)
    }

    pub fn remove_from_wishlist(&self, user_id: &str, product_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM wishlist_items WHERE user_id = ?1 AND product_id = ?2",
            params![user_id, product_id],
        )?;
        Ok(removed > 0)
    }
}
