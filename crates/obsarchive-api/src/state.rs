//! State shared by the handlers.

use std::sync::Arc;

use obsarchive_worker::EngineControl;

/// Handle on the engine being reported on.
#[derive(Clone)]
pub struct ApiState {
    /// The running engine.
    pub engine: Arc<dyn EngineControl>,
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState")
            .field("pipeline", &self.engine.status().pipeline)
            .finish()
    }
}

impl ApiState {
    pub fn new(engine: Arc<dyn EngineControl>) -> Self {
        Self { engine }
    }
}
