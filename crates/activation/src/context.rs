use std::sync::Arc;

use envoy_core::ActivationState;
use envoy_engine::EngineProvider;

use crate::ActivationGate;

/// Activation state and the engine it guards, shared by every component
/// that needs them. One context per activation lifetime.
pub struct ActivationContext {
    gate: ActivationGate,
    engine: Arc<dyn EngineProvider>,
}

impl ActivationContext {
    pub fn new(engine: Arc<dyn EngineProvider>) -> Self {
        Self {
            gate: ActivationGate::new(),
            engine,
        }
    }

    pub fn gate(&self) -> &ActivationGate {
        &self.gate
    }

    pub fn engine(&self) -> &Arc<dyn EngineProvider> {
        &self.engine
    }

    pub fn state(&self) -> ActivationState {
        self.gate.state()
    }
}

impl std::fmt::Debug for ActivationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationContext")
            .field("state", &self.gate.state())
            .field("engine_present", &self.engine.is_present())
            .finish()
    }
}
