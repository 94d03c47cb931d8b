use super::{get_opt_ts, get_ts, new_id, ts, Database};
use crate::error::{Result, StoreError};
use crate::types::{PageRequest, Subscriber};
use chrono::Utc;
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension, Row};

const SUBSCRIBER_COLUMNS: &str =
    "id, email, unsubscribe_token, active, subscribed_at, unsubscribed_at";

fn subscriber_from_row(row: &Row<'_>) -> rusqlite::Result<Subscriber> {
    Ok(Subscriber {
        id: row.get(0)?,
        email: row.get(1)?,
        unsubscribe_token: row.get(2)?,
        active: row.get(3)?,
        subscribed_at: get_ts(row, 4)?,
        unsubscribed_at: get_opt_ts(row, 5)?,
    })
}

impl Database {
    pub fn find_subscriber_by_email(&self, email: &str) -> Result<Option<Subscriber>> {
        let conn = self.conn()?;
        let subscriber = conn
            .query_row(
                &format!("SELECT {SUBSCRIBER_COLUMNS} FROM newsletter_subscribers WHERE email = ?1"),
                params![email],
                subscriber_from_row,
            )
            .optional()?;
        Ok(subscriber)
    }

    pub fn find_subscriber_by_token(&self, token: &str) -> Result<Option<Subscriber>> {
        let conn = self.conn()?;
        let subscriber = conn
            .query_row(
                &format!(
                    "SELECT {SUBSCRIBER_COLUMNS} FROM newsletter_subscribers WHERE unsubscribe_token = ?1"
                ),
                params![token],
                subscriber_from_row,
            )
            .optional()?;
        Ok(subscriber)
    }

    pub fn insert_subscriber(&self, email: &str, token: &str) -> Result<Subscriber> {
        let id = new_id();
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO newsletter_subscribers (id, email, unsubscribe_token, active, subscribed_at)
                 VALUES (?1, ?2, ?3, 1, ?4)",
                params![id, email, token, ts(&Utc::now())],
            )?;
        }
        self.find_subscriber_by_email(email)?
            .ok_or_else(|| StoreError::not_found("Subscriber"))
    }

    /// Reactivating resets `subscribed_at`; deactivating stamps `unsubscribed_at`.
    pub fn set_subscriber_active(&self, id: &str, active: bool) -> Result<()> {
        let now = ts(&Utc::now());
        let conn = self.conn()?;
        if active {
            conn.execute(
                "UPDATE newsletter_subscribers SET active = 1, subscribed_at = ?2, unsubscribed_at = NULL
                 WHERE id = ?1",
                params![id, now],
            )?;
        } else {
            conn.execute(
                "UPDATE newsletter_subscribers SET active = 0, unsubscribed_at = ?2 WHERE id = ?1",
                params![id, now],
            )?;
        }
        Ok(())
    }

    pub fn list_subscribers(&self, active: Option<bool>, page: PageRequest) -> Result<(Vec<Subscriber>, i64)> {
        let (where_sql, mut values) = match active {
            Some(active) => ("WHERE active = ?", vec![Value::Integer(active as i64)]),
            None => ("", Vec::new()),
        };
        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM newsletter_subscribers {where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        values.push(Value::Integer(page.limit()));
        values.push(Value::Integer(page.offset()));
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM newsletter_subscribers {where_sql}
             ORDER BY subscribed_at DESC, id LIMIT ? OFFSET ?"
        ))?;
        let subscribers = stmt
            .query_map(params_from_iter(values.iter()), subscriber_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((subscribers, total))
    }

    /// Every subscriber, oldest first. `active_only` limits to current ones.
    pub fn all_subscribers(&self, active_only: bool) -> Result<Vec<Subscriber>> {
        let conn = self.conn()?;
        let sql = if active_only {
            format!("SELECT {SUBSCRIBER_COLUMNS} FROM newsletter_subscribers WHERE active = 1 ORDER BY subscribed_at, id")
        } else {
            format!("SELECT {SUBSCRIBER_COLUMNS} FROM newsletter_subscribers ORDER BY subscribed_at, id")
        };
        let mut stmt = conn.prepare(&sql)?;
        let subscribers = stmt
            .query_map([], subscriber_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subscribers)
    }

    pub fn count_active_subscribers(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM newsletter_subscribers WHERE active = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
