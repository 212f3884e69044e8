use serde::Deserialize;

/// Top-level webhook delivery. The platform batches events per page object;
/// anything that is not a `page` delivery is rejected upstream.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

/// One inbound event: a message or a postback from a single sender.
#[derive(Debug, Deserialize)]
pub struct MessagingEvent {
    pub sender: Sender,
    pub message: Option<InboundMessage>,
    pub postback: Option<Postback>,
}

#[derive(Debug, Deserialize)]
pub struct Sender {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    /// Absent for attachment-only messages.
    pub text: Option<String>,
    /// Set when the platform reflects our own outbound message back.
    #[serde(default)]
    pub is_echo: bool,
}

#[derive(Debug, Deserialize)]
pub struct Postback {
    pub payload: Option<String>,
    pub title: Option<String>,
}
