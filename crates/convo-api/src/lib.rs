pub mod admin;
pub mod commands;
pub mod dispatcher;
pub mod webhook;

use std::sync::Arc;

use convo_db::Database;

use crate::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
    pub verify_token: String,
}
