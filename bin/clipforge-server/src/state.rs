//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use clipforge_core::Scheduler;

use crate::config::Config;

#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Task runtime: submission, status and retention.
    pub scheduler: Scheduler,
}
