use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::payload::MessagePayload;

/// Graph API version pinned by the bot.
pub const GRAPH_BASE: &str = "https://graph.facebook.com/v17.0";

/// Outbound side of the messaging platform: the Send API plus profile
/// lookups. The base URL is injectable so tests can point at a local mock.
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    recipient: Recipient<'a>,
    message: &'a MessagePayload,
}

#[derive(Serialize)]
struct Recipient<'a> {
    id: &'a str,
}

#[derive(Deserialize)]
struct ProfileResponse {
    name: Option<String>,
}

impl PlatformClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(GRAPH_BASE, access_token)
    }

    pub fn with_base_url(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    pub async fn send_message(&self, psid: &str, message: &MessagePayload) -> Result<()> {
        let url = format!("{}/me/messages", self.base_url);
        self.http
            .post(&url)
            .query(&[("access_token", self.access_token.as_str())])
            .json(&SendRequest {
                recipient: Recipient { id: psid },
                message,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Current display name for an identity, or None when the platform
    /// returns none. Transport and status errors propagate; callers decide
    /// whether a failed lookup is tolerable.
    pub async fn fetch_display_name(&self, psid: &str) -> Result<Option<String>> {
        let url = format!("{}/{}", self.base_url, psid);
        let profile: ProfileResponse = self
            .http
            .get(&url)
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("fields", "name"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(profile.name)
    }
}
