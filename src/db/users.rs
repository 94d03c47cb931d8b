use super::{get_enum, get_ts, is_unique_violation, like_pattern, new_id, ts, Database};
use crate::error::{Result, StoreError};
use crate::types::{PageRequest, Role, User};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, email, name, phone, role, banned, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        role: get_enum(row, 4)?,
        banned: row.get(5)?,
        created_at: get_ts(row, 6)?,
        updated_at: get_ts(row, 7)?,
    })
}

/// Admin user search.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub q: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserOrderStats {
    pub order_count: i64,
    pub lifetime_spend_cents: i64,
}

impl Database {
    pub fn insert_user(&self, email: &str, name: &str, password_hash: &str, role: Role) -> Result<User> {
        let now = Utc::now();
        let user = User {
            id: new_id(),
            email: email.to_string(),
            name: name.to_string(),
            phone: None,
            role,
            banned: false,
            created_at: now,
            updated_at: now,
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, email, name, phone, password_hash, role, banned, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, 0, ?6, ?6)",
            params![user.id, user.email, user.name, password_hash, role.as_str(), ts(&now)],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::conflict("An account with this email already exists")
            } else {
                e.into()
            }
        })?;
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// The user plus their stored password hash, for login.
    pub fn find_user_credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
                params![email],
                |row| Ok((user_from_row(row)?, row.get::<_, String>(8)?)),
            )
            .optional()?;
        Ok(found)
    }

    pub fn password_hash(&self, user_id: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let hash = conn
            .query_row(
                "SELECT password_hash FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    pub fn update_user_profile(&self, id: &str, name: &str, phone: Option<&str>) -> Result<Option<User>> {
        {
            let conn = self.conn()?;
            let changed = conn.execute(
                "UPDATE users SET name = ?2, phone = ?3, updated_at = ?4 WHERE id = ?1",
                params![id, name, phone, ts(&Utc::now())],
            )?;
            if changed == 0 {
                return Ok(None);
            }
        }
        self.get_user(id)
    }

    pub fn set_password_hash(&self, id: &str, hash: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, hash, ts(&Utc::now())],
        )?;
        Ok(())
    }

    pub fn set_user_role(&self, id: &str, role: Role) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, role.as_str(), ts(&Utc::now())],
        )?;
        Ok(changed > 0)
    }

    /// Ban or unban. Banning also ends every session of the user.
    pub fn set_user_banned(&self, id: &str, banned: bool) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE users SET banned = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, banned, ts(&Utc::now())],
        )?;
        if banned {
            tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(changed > 0)
    }

    pub fn delete_user(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub fn list_users(&self, filter: &UserFilter, page: PageRequest) -> Result<(Vec<User>, i64)> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            clauses.push("(LOWER(email) LIKE ? ESCAPE '\\' OR LOWER(name) LIKE ? ESCAPE '\\')");
            let pattern = like_pattern(q);
            values.push(Value::Text(pattern.clone()));
            values.push(Value::Text(pattern));
        }
        if let Some(role) = filter.role {
            clauses.push("role = ?");
            values.push(Value::Text(role.as_str().to_string()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM users {where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        values.push(Value::Integer(page.limit()));
        values.push(Value::Integer(page.offset()));
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users {where_sql} ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ))?;
        let users = stmt
            .query_map(params_from_iter(values.iter()), user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((users, total))
    }

    pub fn user_order_stats(&self, user_id: &str) -> Result<UserOrderStats> {
        let conn = self.conn()?;
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status IN ('paid', 'processing', 'shipped', 'delivered')
                                      THEN total_cents ELSE 0 END), 0)
             FROM orders WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(UserOrderStats {
                    order_count: row.get(0)?,
                    lifetime_spend_cents: row.get(1)?,
                })
            },
        )?;
        Ok(stats)
    }

    pub fn count_admins(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'admin' AND banned = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // Sessions

    pub fn insert_session(&self, token_hash: &str, user_id: &str, expires_at: &DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![token_hash, user_id, ts(&Utc::now()), ts(expires_at)],
        )?;
        Ok(())
    }

    /// Returns the session's user id and expiry.
    pub fn find_session(&self, token_hash: &str) -> Result<Option<(String, DateTime<Utc>)>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                "SELECT user_id, expires_at FROM sessions WHERE token_hash = ?1",
                params![token_hash],
                |row| Ok((row.get::<_, String>(0)?, get_ts(row, 1)?)),
            )
            .optional()?;
        Ok(session)
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])?;
        Ok(())
    }

    /// End all of a user's sessions, optionally keeping one.
    pub fn delete_user_sessions(&self, user_id: &str, keep_token_hash: Option<&str>) -> Result<usize> {
        let conn = self.conn()?;
        let removed = match keep_token_hash {
            Some(keep) => conn.execute(
                "DELETE FROM sessions WHERE user_id = ?1 AND token_hash != ?2",
                params![user_id, keep],
            )?,
            None => conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?,
        };
        Ok(removed)
    }

    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![ts(&Utc::now())],
        )?;
        Ok(removed)
    }
}
