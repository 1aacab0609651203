use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::JobController;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (JWT settings are read by the auth extractor).
    pub config: Arc<ServerConfig>,
    /// Owner of all plan generation jobs.
    pub controller: Arc<JobController>,
}
