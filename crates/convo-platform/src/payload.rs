use serde::Serialize;

/// Outbound message body in the platform's Send API shape: either
/// `{"text": ...}` or `{"attachment": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessagePayload {
    Text { text: String },
    Attachment { attachment: Attachment },
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: AttachmentPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentPayload {
    pub url: String,
    pub is_reusable: bool,
}

impl MessagePayload {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePayload::Text { text: text.into() }
    }

    /// Image attachment. `is_reusable` asks the platform to cache the asset
    /// for reuse across sends.
    pub fn image(url: impl Into<String>, is_reusable: bool) -> Self {
        MessagePayload::Attachment {
            attachment: Attachment {
                kind: "image".into(),
                payload: AttachmentPayload {
                    url: url.into(),
                    is_reusable,
                },
            },
        }
    }
}
