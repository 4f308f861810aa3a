//! Application state shared with the web layer.

use crate::openclaw::{CommandRunner, DatasetSettings, OpenClaw};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub openclaw: Arc<OpenClaw>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &DatasetSettings) -> Self {
        Self {
            openclaw: Arc::new(OpenClaw::new(runner, settings)),
            started_at: Instant::now(),
        }
    }
}
