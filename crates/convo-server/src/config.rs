use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Runtime configuration, read once from the environment at startup
/// (`.env` honored).
pub struct Config {
    pub page_access_token: String,
    pub verify_token: String,
    pub admin_psid: Option<String>,
    pub openai_api_key: Option<String>,
    pub host: String,
    pub port: u16,
    pub poll_interval: Duration,
    pub db_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let page_access_token =
            std::env::var("PAGE_ACCESS_TOKEN").context("PAGE_ACCESS_TOKEN must be set")?;
        let verify_token = std::env::var("VERIFY_TOKEN").unwrap_or_else(|_| "VERIFY123".into());
        let admin_psid = std::env::var("ADMIN_PSID").ok().filter(|v| !v.is_empty());
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok().filter(|v| !v.is_empty());

        let host = std::env::var("CONVO_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("PORT must be a number")?;

        let poll_minutes: u64 = std::env::var("POLL_INTERVAL_MIN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let db_path: PathBuf = std::env::var("CONVO_DB_PATH")
            .unwrap_or_else(|_| "botdata.sqlite3".into())
            .into();

        Ok(Self {
            page_access_token,
            verify_token,
            admin_psid,
            openai_api_key,
            host,
            port,
            poll_interval: poll_interval(poll_minutes),
            db_path,
        })
    }
}

/// Watcher interval, floored to one minute regardless of configuration.
pub fn poll_interval(minutes: u64) -> Duration {
    Duration::from_secs(minutes.max(1) * 60)
}
