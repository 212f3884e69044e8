use serde::{Deserialize, Serialize};

// -- Admin: lock management --

#[derive(Debug, Serialize)]
pub struct LockStateResponse {
    pub psid: String,
    pub nickname: Option<String>,
    pub last_known_name: Option<String>,
    pub name_locked: bool,
    pub lock_since: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleLockRequest {
    pub psid: String,
    pub lock: bool,
}

#[derive(Debug, Serialize)]
pub struct ToggleLockResponse {
    pub ok: bool,
}

// -- Admin: alerts --

#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub id: i64,
    pub psid: String,
    pub old_name: String,
    pub new_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
