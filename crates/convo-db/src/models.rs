/// Database row types — these map directly to SQLite rows.
/// Distinct from convo-types API models to keep the DB layer independent.

pub struct UserRow {
    pub psid: String,
    pub nickname: Option<String>,
    pub last_known_name: Option<String>,
    pub name_locked: bool,
    pub lock_since: Option<i64>,
}

/// Slim projection used by the watcher scan.
pub struct LockedUserRow {
    pub psid: String,
    pub last_known_name: Option<String>,
}

pub struct AlertRow {
    pub id: i64,
    pub psid: String,
    pub old_name: String,
    pub new_name: String,
    pub created_at: i64,
}
