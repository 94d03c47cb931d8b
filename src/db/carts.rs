use super::{ts, Database};
use crate::error::Result;
use crate::types::CartLine;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

impl Database {
    /// Cart lines joined with live product data, oldest first.
    pub fn cart_lines(&self, user_id: &str) -> Result<Vec<CartLine>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.id, p.slug, p.name, p.image_url, p.price_cents, c.quantity, p.stock, p.active
             FROM cart_items c JOIN products p ON p.id = c.product_id
             WHERE c.user_id = ?1
             ORDER BY c.added_at, p.name",
        )?;
        let lines = stmt
            .query_map(params![user_id], |row| {
                let unit_price_cents: i64 = row.get(4)?;
                let quantity: i64 = row.get(5)?;
                let stock: i64 = row.get(6)?;
                let active: bool = row.get(7)?;
                Ok(CartLine {
                    product_id: row.get(0)?,
                    slug: row.get(1)?,
                    name: row.get(2)?,
                    image_url: row.get(3)?,
                    unit_price_cents,
                    quantity,
                    stock,
                    available: active && stock > 0,
                    line_total_cents: unit_price_cents * quantity,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lines)
    }

    pub fn cart_quantity(&self, user_id: &str, product_id: &str) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let quantity = conn
            .query_row(
                "SELECT quantity FROM cart_items WHERE user_id = ?1 AND product_id = ?2",
                params![user_id, product_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(quantity)
    }

    /// Insert or overwrite the line's quantity. Keeps the original `added_at`.
    pub fn set_cart_quantity(&self, user_id: &str, product_id: &str, quantity: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cart_items (user_id, product_id, quantity, added_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, product_id) DO UPDATE SET quantity = excluded.quantity",
            params![user_id, product_id, quantity, ts(&Utc::now())],
        )?;
        Ok(())
    }

    pub fn remove_cart_item(&self, user_id: &str, product_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM cart_items WHERE user_id = ?1 AND product_id = ?2",
            params![user_id, product_id],
        )?;
        Ok(removed > 0)
    }

    pub fn clear_cart(&self, user_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM cart_items WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }
}
