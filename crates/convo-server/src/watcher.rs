use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use convo_db::Database;
use convo_db::models::LockedUserRow;
use convo_platform::{MessagePayload, PlatformClient};

/// Background task that watches locked users for display-name changes.
///
/// Runs on an interval, fetches each locked user's current name from the
/// platform, records an alert and notifies the admin when it differs from
/// the last-known value.
pub struct Watcher {
    db: Arc<Database>,
    platform: Arc<PlatformClient>,
    admin_psid: Option<String>,
}

impl Watcher {
    pub fn new(
        db: Arc<Database>,
        platform: Arc<PlatformClient>,
        admin_psid: Option<String>,
    ) -> Self {
        Self {
            db,
            platform,
            admin_psid,
        }
    }

    pub async fn run(self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Name watcher stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.run_once().await {
                Ok(alerts) => {
                    if alerts > 0 {
                        info!("Watch pass raised {} alert(s)", alerts);
                    }
                }
                Err(e) => {
                    warn!("Watch pass failed: {:#}", e);
                }
            }
        }
    }

    /// One scan over all locked users. Each user is its own failure domain:
    /// a failed lookup is logged and skipped without touching its state.
    /// Returns the number of alerts raised.
    pub async fn run_once(&self) -> Result<usize> {
        let users = {
            let db = self.db.clone();
            tokio::task::spawn_blocking(move || db.locked_users()).await??
        };

        let mut alerts = 0;
        for user in users {
            match self.check_user(&user).await {
                Ok(true) => alerts += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Poll error for {}: {:#}", user.psid, e);
                }
            }
        }

        Ok(alerts)
    }

    async fn check_user(&self, user: &LockedUserRow) -> Result<bool> {
        let Some(current) = self.platform.fetch_display_name(&user.psid).await? else {
            warn!("No display name returned for {}", user.psid);
            return Ok(false);
        };

        match &user.last_known_name {
            Some(last) if *last != current => {
                {
                    let db = self.db.clone();
                    let psid = user.psid.clone();
                    let old = last.clone();
                    let new = current.clone();
                    tokio::task::spawn_blocking(move || db.insert_alert(&psid, &old, &new))
                        .await??;
                }

                if let Some(admin) = &self.admin_psid {
                    let notice = MessagePayload::text(format!(
                        "ALERT: User {} changed name from \"{}\" to \"{}\"",
                        user.psid, last, current
                    ));
                    // Notify failures must not block the state update.
                    if let Err(e) = self.platform.send_message(admin, &notice).await {
                        error!("Admin notify failed for {}: {:#}", user.psid, e);
                    }
                }

                self.store_name(&user.psid, &current).await?;
                Ok(true)
            }
            Some(_) => Ok(false),
            // First observation of a locked user: record, no alert.
            None => {
                self.store_name(&user.psid, &current).await?;
                Ok(false)
            }
        }
    }

    async fn store_name(&self, psid: &str, name: &str) -> Result<()> {
        let db = self.db.clone();
        let psid = psid.to_string();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || db.set_last_known_name(&psid, &name)).await??;
        Ok(())
    }
}
