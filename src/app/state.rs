//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::MatchRegistry;
use crate::session::SessionCoordinator;
use crate::settlement::{build_reporter, ResultReporter};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_registry: Arc<MatchRegistry>,
    pub coordinator: Arc<SessionCoordinator>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let reporter = build_reporter(&config.settlement);
        Self::with_reporter(config, reporter)
    }

    /// Build state around a specific result reporter
    pub fn with_reporter(config: Config, reporter: Arc<dyn ResultReporter>) -> Self {
        let config = Arc::new(config);

        // One registry per server instance, injected into the coordinator
        let match_registry = Arc::new(MatchRegistry::new());

        let coordinator = Arc::new(SessionCoordinator::new(
            match_registry.clone(),
            reporter,
            config.auto_leave_on_disconnect,
        ));

        Self {
            config,
            match_registry,
            coordinator,
        }
    }
}
