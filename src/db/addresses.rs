use super::{get_ts, new_id, ts, Database};
use crate::error::{Result, StoreError};
use crate::types::{non_empty, Address, AddressInput};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

const ADDRESS_COLUMNS: &str = "id, user_id, label, recipient, line1, line2, city, region, \
     postal_code, country, phone, is_default, created_at";

fn address_from_row(row: &Row<'_>) -> rusqlite::Result<Address> {
    Ok(Address {
        id: row.get(0)?,
        user_id: row.get(1)?,
        label: row.get(2)?,
        recipient: row.get(3)?,
        line1: row.get(4)?,
        line2: row.get(5)?,
        city: row.get(6)?,
        region: row.get(7)?,
        postal_code: row.get(8)?,
        country: row.get(9)?,
        phone: row.get(10)?,
        is_default: row.get(11)?,
        created_at: get_ts(row, 12)?,
    })
}

impl Database {
    /// Default address first, then newest.
    pub fn list_addresses(&self, user_id: &str) -> Result<Vec<Address>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = ?1
             ORDER BY is_default DESC, created_at DESC"
        ))?;
        let addresses = stmt
            .query_map(params![user_id], address_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(addresses)
    }

    /// Only returns the address if it belongs to `user_id`.
    pub fn get_address(&self, user_id: &str, id: &str) -> Result<Option<Address>> {
        let conn = self.conn()?;
        let address = conn
            .query_row(
                &format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                address_from_row,
            )
            .optional()?;
        Ok(address)
    }

    /// Insert an address. The user's first address becomes the default.
    pub fn insert_address(&self, user_id: &str, input: &AddressInput) -> Result<Address> {
        let id = new_id();
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let existing: i64 = tx.query_row(
                "SELECT COUNT(*) FROM addresses WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO addresses (id, user_id, label, recipient, line1, line2, city, region,
                                        postal_code, country, phone, is_default, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    id,
                    user_id,
                    non_empty(&input.label),
                    input.recipient.trim(),
                    input.line1.trim(),
                    non_empty(&input.line2),
                    input.city.trim(),
                    non_empty(&input.region),
                    input.postal_code.trim(),
                    input.country.trim(),
                    non_empty(&input.phone),
                    existing == 0,
                    ts(&Utc::now()),
                ],
            )?;
            tx.commit()?;
        }
        self.get_address(user_id, &id)?
            .ok_or_else(|| StoreError::not_found("Address"))
    }

    pub fn update_address(&self, user_id: &str, id: &str, input: &AddressInput) -> Result<Option<Address>> {
        {
            let conn = self.conn()?;
            let changed = conn.execute(
                "UPDATE addresses SET label = ?3, recipient = ?4, line1 = ?5, line2 = ?6, city = ?7,
                        region = ?8, postal_code = ?9, country = ?10, phone = ?11
                 WHERE id = ?1 AND user_id = ?2",
                params![
                    id,
                    user_id,
                    non_empty(&input.label),
                    input.recipient.trim(),
                    input.line1.trim(),
                    non_empty(&input.line2),
                    input.city.trim(),
                    non_empty(&input.region),
                    input.postal_code.trim(),
                    input.country.trim(),
                    non_empty(&input.phone),
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
        }
        self.get_address(user_id, id)
    }

    /// Delete an address. If it was the default, the most recently created
    /// remaining address takes over.
    pub fn delete_address(&self, user_id: &str, id: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let was_default: Option<bool> = tx
            .query_row(
                "SELECT is_default FROM addresses WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(was_default) = was_default else {
            return Ok(false);
        };
        tx.execute(
            "DELETE FROM addresses WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if was_default {
            tx.execute(
                "UPDATE addresses SET is_default = 1 WHERE id = (
                     SELECT id FROM addresses WHERE user_id = ?1 ORDER BY created_at DESC, id LIMIT 1)",
                params![user_id],
            )?;
        }
        tx.commit()?;
        Ok(true)
    }

    pub fn set_default_address(&self, user_id: &str, id: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let owned = tx
            .query_row(
                "SELECT 1 FROM addresses WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !owned {
            return Ok(false);
        }
        tx.execute(
            "UPDATE addresses SET is_default = (id = ?2) WHERE user_id = ?1",
            params![user_id, id],
        )?;
        tx.commit()?;
        Ok(true)
    }
}
