//! Application state.

use std::path::PathBuf;
use std::sync::Arc;

use vpress_worker::Orchestrator;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<Orchestrator>,
    /// Where accepted uploads are written before submission
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(config: ApiConfig, orchestrator: Arc<Orchestrator>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            orchestrator,
            upload_dir: upload_dir.into(),
        }
    }
}
