//! Shared handler state

use std::sync::Arc;

use loadrig_execution::ExecutionManager;

/// State handed to every handler
#[derive(Clone)]
pub struct AppContext {
    pub manager: Arc<ExecutionManager>,
}

impl AppContext {
    pub fn new(manager: Arc<ExecutionManager>) -> Self {
        Self { manager }
    }
}
