//! Handler types and dependencies

use std::sync::Arc;

use grabcore::Orchestrator;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub orchestrator: Arc<Orchestrator>,
}

impl HandlerDeps {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}
