//! Process-wide engine slot, owned and injected rather than global

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{EngineConfig, EngineError, NetworkEngine, Result};

/// What the activation core needs from an engine holder
pub trait EngineProvider: Send + Sync {
    /// Whether an engine has already been configured
    fn is_present(&self) -> bool;

    /// Configure the engine with `egress_url` as its sole egress path
    fn configure(&self, egress_url: &str, user_agent: &str) -> Result<()>;

    /// The configured engine, for callers that route through it
    fn engine(&self) -> Option<Arc<NetworkEngine>> {
        None
    }
}

/// Holds at most one `NetworkEngine`
#[derive(Debug)]
pub struct EngineSlot {
    engine: RwLock<Option<Arc<NetworkEngine>>>,
    template: EngineConfig,
}

impl EngineSlot {
    pub fn new() -> Self {
        Self::with_template(EngineConfig::default())
    }

    /// Engines built by `configure` start from `template` (timeouts, encodings)
    pub fn with_template(template: EngineConfig) -> Self {
        Self {
            engine: RwLock::new(None),
            template,
        }
    }

    /// Current engine, if any
    pub fn current(&self) -> Option<Arc<NetworkEngine>> {
        self.engine.read().clone()
    }

    /// Current engine or `NotInitialized`
    pub fn require(&self) -> Result<Arc<NetworkEngine>> {
        self.current().ok_or(EngineError::NotInitialized)
    }

    /// Build and install an engine
    ///
    /// Returns `Ok(false)` without touching the slot when an engine exists and
    /// `reinitialize_if_needed` is false. Serialized by the slot's write lock.
    pub fn initialize(&self, config: EngineConfig, reinitialize_if_needed: bool) -> Result<bool> {
        debug!("Initializing engine with {}", config.egress_url);
        let mut slot = self.engine.write();
        if slot.is_some() && !reinitialize_if_needed {
            debug!("Engine already initialized, reinitialize_if_needed is false");
            return Ok(false);
        }

        let engine = NetworkEngine::build(config)?;
        info!("Engine ready: {}", engine.version_string());
        *slot = Some(Arc::new(engine));
        Ok(true)
    }
}

impl Default for EngineSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineProvider for EngineSlot {
    fn is_present(&self) -> bool {
        self.engine.read().is_some()
    }

    fn configure(&self, egress_url: &str, user_agent: &str) -> Result<()> {
        let config = EngineConfig {
            egress_url: egress_url.to_string(),
            user_agent: user_agent.to_string(),
            ..self.template.clone()
        };
        self.initialize(config, false).map(|_| ())
    }

    fn engine(&self) -> Option<Arc<NetworkEngine>> {
        self.current()
    }
}
