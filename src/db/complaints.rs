use super::{get_enum, get_ts, new_id, ts, Database};
use crate::error::{Result, StoreError};
use crate::types::{Complaint, ComplaintStatus, PageRequest};
use chrono::Utc;
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension, Row};

const COMPLAINT_COLUMNS: &str = "id, user_id, email, order_id, subject, message, status, \
     admin_response, created_at, updated_at";

fn complaint_from_row(row: &Row<'_>) -> rusqlite::Result<Complaint> {
    Ok(Complaint {
        id: row.get(0)?,
        user_id: row.get(1)?,
        email: row.get(2)?,
        order_id: row.get(3)?,
        subject: row.get(4)?,
        message: row.get(5)?,
        status: get_enum(row, 6)?,
        admin_response: row.get(7)?,
        created_at: get_ts(row, 8)?,
        updated_at: get_ts(row, 9)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewComplaint<'a> {
    pub user_id: Option<&'a str>,
    pub email: &'a str,
    pub order_id: Option<&'a str>,
    pub subject: &'a str,
    pub message: &'a str,
}

impl Database {
    pub fn insert_complaint(&self, new: &NewComplaint<'_>) -> Result<Complaint> {
        let id = new_id();
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO complaints (id, user_id, email, order_id, subject, message, status,
                                         admin_response, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'open', NULL, ?7, ?7)",
                params![
                    id,
                    new.user_id,
                    new.email,
                    new.order_id,
                    new.subject,
                    new.message,
                    ts(&Utc::now())
                ],
            )?;
        }
        self.get_complaint(&id)?
            .ok_or_else(|| StoreError::not_found("Complaint"))
    }

    pub fn get_complaint(&self, id: &str) -> Result<Option<Complaint>> {
        let conn = self.conn()?;
        let complaint = conn
            .query_row(
                &format!("SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = ?1"),
                params![id],
                complaint_from_row,
            )
            .optional()?;
        Ok(complaint)
    }

    pub fn list_complaints(&self, status: Option<ComplaintStatus>, page: PageRequest) -> Result<(Vec<Complaint>, i64)> {
        let (where_sql, mut values) = match status {
            Some(status) => ("WHERE status = ?", vec![Value::Text(status.as_str().to_string())]),
            None => ("", Vec::new()),
        };
        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM complaints {where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        values.push(Value::Integer(page.limit()));
        values.push(Value::Integer(page.offset()));
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints {where_sql}
             ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ))?;
        let complaints = stmt
            .query_map(params_from_iter(values.iter()), complaint_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((complaints, total))
    }

    pub fn complaints_for_user(&self, user_id: &str) -> Result<Vec<Complaint>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE user_id = ?1 ORDER BY created_at DESC, id"
        ))?;
        let complaints = stmt
            .query_map(params![user_id], complaint_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(complaints)
    }

    /// `None` leaves a field unchanged.
    pub fn update_complaint(
        &self,
        id: &str,
        status: Option<ComplaintStatus>,
        admin_response: Option<&str>,
    ) -> Result<Option<Complaint>> {
        {
            let conn = self.conn()?;
            let changed = conn.execute(
                "UPDATE complaints SET status = COALESCE(?2, status),
                        admin_response = COALESCE(?3, admin_response), updated_at = ?4
                 WHERE id = ?1",
                params![id, status.map(|s| s.as_str()), admin_response, ts(&Utc::now())],
            )?;
            if changed == 0 {
                return Ok(None);
            }
        }
        self.get_complaint(id)
    }

    pub fn count_open_complaints(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM complaints WHERE status IN ('open', 'in_progress')",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
