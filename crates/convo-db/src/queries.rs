use crate::Database;
use crate::models::{AlertRow, LockedUserRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

impl Database {
    // -- Users --

    pub fn get_user(&self, psid: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, psid))
    }

    /// Create a user row on first contact. The display name is whatever the
    /// platform returned at that moment (or absent when the fetch failed).
    /// Returns true when a new row was inserted.
    pub fn ensure_user(&self, psid: &str, display_name: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (psid, last_known_name) VALUES (?1, ?2)",
                params![psid, display_name],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn set_nickname(&self, psid: &str, nickname: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (psid, nickname) VALUES (?1, ?2)
                 ON CONFLICT(psid) DO UPDATE SET nickname = excluded.nickname",
                params![psid, nickname],
            )?;
            Ok(())
        })
    }

    pub fn set_last_known_name(&self, psid: &str, name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_known_name = ?1 WHERE psid = ?2",
                params![name, psid],
            )?;
            Ok(())
        })
    }

    /// Toggle the watch lock, stamping lock_since. Upserts so an identity
    /// can be locked before it ever messages the bot.
    pub fn set_lock(&self, psid: &str, lock: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (psid, name_locked, lock_since)
                 VALUES (?1, ?2, strftime('%s','now'))
                 ON CONFLICT(psid) DO UPDATE SET
                    name_locked = excluded.name_locked,
                    lock_since = excluded.lock_since",
                params![psid, lock as i64],
            )?;
            Ok(())
        })
    }

    pub fn locked_users(&self) -> Result<Vec<LockedUserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT psid, last_known_name FROM users WHERE name_locked = 1")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(LockedUserRow {
                        psid: row.get(0)?,
                        last_known_name: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn all_lock_states(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT psid, nickname, last_known_name, name_locked, lock_since FROM users",
            )?;
            let rows = stmt
                .query_map([], map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- XP --

    /// Increment the sender's point counter, creating it at 1 on first
    /// contact. Returns the new total.
    pub fn add_xp(&self, psid: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO xp (psid, points) VALUES (?1, 1)
                 ON CONFLICT(psid) DO UPDATE SET points = points + 1",
                [psid],
            )?;
            let points =
                conn.query_row("SELECT points FROM xp WHERE psid = ?1", [psid], |row| {
                    row.get(0)
                })?;
            Ok(points)
        })
    }

    pub fn get_xp(&self, psid: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let points: Option<i64> = conn
                .query_row("SELECT points FROM xp WHERE psid = ?1", [psid], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(points.unwrap_or(0))
        })
    }

    // -- Alerts --

    pub fn insert_alert(&self, psid: &str, old_name: &str, new_name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO alerts (psid, old_name, new_name) VALUES (?1, ?2, ?3)",
                params![psid, old_name, new_name],
            )?;
            Ok(())
        })
    }

    /// Newest first. The table is append-only with no retention, so reads
    /// are always capped.
    pub fn recent_alerts(&self, limit: u32) -> Result<Vec<AlertRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, psid, old_name, new_name, created_at
                 FROM alerts
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(AlertRow {
                        id: row.get(0)?,
                        psid: row.get(1)?,
                        old_name: row.get(2)?,
                        new_name: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, psid: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT psid, nickname, last_known_name, name_locked, lock_since
         FROM users WHERE psid = ?1",
    )?;

    let row = stmt.query_row([psid], map_user_row).optional()?;

    Ok(row)
}

fn map_user_row(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        psid: row.get(0)?,
        nickname: row.get(1)?,
        last_known_name: row.get(2)?,
        name_locked: row.get::<_, i64>(3)? != 0,
        lock_since: row.get(4)?,
    })
}
