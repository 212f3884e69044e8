use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

pub const OPENAI_BASE: &str = "https://api.openai.com/v1";
const MODEL: &str = "gpt-4o-mini";

/// Optional text-completion backend for `/ai`. Only constructed when an API
/// key is configured.
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl CompletionClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(OPENAI_BASE, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub async fn complete(&self, query: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let response: ChatResponse = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: MODEL,
                messages: vec![ChatMessage {
                    role: "user",
                    content: query,
                }],
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("completion response had no choices"))
    }
}
