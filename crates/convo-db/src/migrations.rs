use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            psid            TEXT PRIMARY KEY,
            nickname        TEXT,
            last_known_name TEXT,
            name_locked     INTEGER NOT NULL DEFAULT 0,
            lock_since      INTEGER
        );

        CREATE TABLE IF NOT EXISTS alerts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            psid        TEXT NOT NULL,
            old_name    TEXT NOT NULL,
            new_name    TEXT NOT NULL,
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s','now'))
        );

        CREATE INDEX IF NOT EXISTS idx_alerts_created
            ON alerts(created_at DESC);

        CREATE TABLE IF NOT EXISTS xp (
            psid    TEXT PRIMARY KEY,
            points  INTEGER NOT NULL DEFAULT 0
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
