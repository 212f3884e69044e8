use axum::{Json, extract::State, http::StatusCode};
use tracing::error;

use convo_types::api::{AlertResponse, LockStateResponse, ToggleLockRequest, ToggleLockResponse};

use crate::AppState;

/// Read cap on the append-only alerts table. Growth is unbounded by design;
/// only reads are limited.
const ALERT_READ_CAP: u32 = 200;

/// GET /admin/locks — every known user with its lock state.
pub async fn get_locks(
    State(state): State<AppState>,
) -> Result<Json<Vec<LockStateResponse>>, StatusCode> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.all_lock_states())
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(
        rows.into_iter()
            .map(|row| LockStateResponse {
                psid: row.psid,
                nickname: row.nickname,
                last_known_name: row.last_known_name,
                name_locked: row.name_locked,
                lock_since: row.lock_since,
            })
            .collect(),
    ))
}

/// POST /admin/toggle-lock — upsert the lock flag for an identity.
pub async fn toggle_lock(
    State(state): State<AppState>,
    Json(req): Json<ToggleLockRequest>,
) -> Result<Json<ToggleLockResponse>, StatusCode> {
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || db.set_lock(&req.psid, req.lock))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(ToggleLockResponse { ok: true }))
}

/// GET /admin/alerts — newest first, capped.
pub async fn get_alerts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AlertResponse>>, StatusCode> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.recent_alerts(ALERT_READ_CAP))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(
        rows.into_iter()
            .map(|row| AlertResponse {
                id: row.id,
                psid: row.psid,
                old_name: row.old_name,
                new_name: row.new_name,
                created_at: chrono::DateTime::from_timestamp(row.created_at, 0)
                    .unwrap_or_default(),
            })
            .collect(),
    ))
}
