use super::{get_enum, get_opt_ts, get_ts, ts, Database};
use crate::error::Result;
use crate::types::{Notification, PageRequest};
use chrono::Utc;
use rusqlite::{params, Row};

const NOTIFICATION_COLUMNS: &str = "id, kind, title, body, link, created_at, read_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        kind: get_enum(row, 1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        link: row.get(4)?,
        created_at: get_ts(row, 5)?,
        read_at: get_opt_ts(row, 6)?,
    })
}

impl Database {
    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO notifications ({NOTIFICATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)"),
            params![
                notification.id,
                notification.kind.as_str(),
                notification.title,
                notification.body,
                notification.link,
                ts(&notification.created_at)
            ],
        )?;
        Ok(())
    }

    pub fn list_notifications(&self, unread_only: bool, page: PageRequest) -> Result<(Vec<Notification>, i64)> {
        let where_sql = if unread_only { "WHERE read_at IS NULL" } else { "" };
        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM notifications {where_sql}"),
            [],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications {where_sql}
             ORDER BY created_at DESC, id LIMIT ?1 OFFSET ?2"
        ))?;
        let notifications = stmt
            .query_map(params![page.limit(), page.offset()], notification_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((notifications, total))
    }

    /// Marking an already-read notification keeps its original read time.
    pub fn mark_notification_read(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let exists = conn.execute(
            "UPDATE notifications SET read_at = COALESCE(read_at, ?2) WHERE id = ?1",
            params![id, ts(&Utc::now())],
        )?;
        Ok(exists > 0)
    }

    pub fn mark_all_notifications_read(&self) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE notifications SET read_at = ?1 WHERE read_at IS NULL",
            params![ts(&Utc::now())],
        )?;
        Ok(changed)
    }
}
