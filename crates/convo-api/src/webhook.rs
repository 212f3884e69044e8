use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, warn};

use convo_types::webhook::WebhookPayload;

use crate::AppState;

/// Handshake query sent by the platform when the webhook is registered.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// GET /webhook — echo the challenge when the verify token matches.
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, StatusCode> {
    if query.mode.is_some() && query.verify_token.as_deref() == Some(state.verify_token.as_str()) {
        info!("Webhook verification succeeded");
        return Ok(query.challenge.unwrap_or_default());
    }
    warn!("Webhook verification rejected");
    Err(StatusCode::FORBIDDEN)
}

/// POST /webhook — event delivery. Every event in the batch is dispatched
/// with its own failure domain; the platform only needs the acknowledgement.
pub async fn receive(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Result<&'static str, StatusCode> {
    if payload.object != "page" {
        return Err(StatusCode::NOT_FOUND);
    }

    for entry in &payload.entry {
        for event in &entry.messaging {
            state.dispatcher.handle_event(event).await;
        }
    }

    Ok("EVENT_RECEIVED")
}
