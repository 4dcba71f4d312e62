//! Engine activation: configure, then canary

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::{ActivationContext, Canary, CanaryError};

/// What one activation attempt did
#[derive(Debug)]
pub enum SequenceOutcome {
    /// Engine configured; the canary runs in the background
    Configured {
        canary: JoinHandle<Result<String, CanaryError>>,
    },
    /// An engine was already present; nothing reconfigured, no canary
    AlreadyConfigured,
    /// The engine rejected the winning URL
    ConfigureFailed(String),
}

/// Runs after the gate's single successful transition
pub struct EngineActivationSequencer {
    context: Arc<ActivationContext>,
    canary: Arc<dyn Canary>,
    user_agent: String,
}

impl EngineActivationSequencer {
    pub fn new(context: Arc<ActivationContext>, canary: Arc<dyn Canary>, user_agent: impl Into<String>) -> Self {
        Self {
            context,
            canary,
            user_agent: user_agent.into(),
        }
    }

    /// Configure the engine for `egress_url` and launch the canary
    ///
    /// Must run inside a tokio runtime. Failures are logged and never roll
    /// back the activation state.
    pub fn activate(&self, egress_url: &str) -> SequenceOutcome {
        let engine = self.context.engine();
        if engine.is_present() {
            info!("Engine already started, skipping activation for {}", egress_url);
            return SequenceOutcome::AlreadyConfigured;
        }

        if let Err(e) = engine.configure(egress_url, &self.user_agent) {
            error!(
                "Failed to configure engine for {}: {}; activation is spent and cannot be retried, later winners will be ignored",
                egress_url, e
            );
            return SequenceOutcome::ConfigureFailed(e.to_string());
        }
        info!("Engine configured for {}", egress_url);

        let canary = self.canary.clone();
        let configured = engine.engine();
        let handle = tokio::spawn(async move {
            let result = canary.check(configured).await;
            match &result {
                Ok(body) => debug!("Proxied request returns {}", body.trim()),
                Err(CanaryError::MalformedTarget(e)) => error!("Failed to proxy request: {}", e),
                Err(CanaryError::Io(e)) => error!("Failed to read response: {}", e),
            }
            result
        });

        SequenceOutcome::Configured { canary: handle }
    }
}
