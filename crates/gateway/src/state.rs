use std::sync::Arc;

use vg_domain::config::Config;

use crate::monitor::MonitorRegistry;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<MonitorRegistry>,
}
