//! Envoy Activation
//!
//! Orchestrates one validation round into one activated egress path.
//!
//! ## Components
//!
//! - **ActivationGate**: at-most-once `inactive -> active(url)` transition
//! - **EngineActivationSequencer**: configures the engine for the winner and
//!   launches the canary check
//! - **ResultListener**: consumes prober events; dispatches then gates
//! - **SurfaceDispatcher**: forwards each event to the visible surface if it
//!   implements `ActivationObserver`
//! - **ServiceBinder**: bind-on-visible / unbind-on-hidden prober connection
//! - **Orchestrator**: wires the above around an injected `ActivationContext`
//!
//! ## Flow
//!
//! ```text
//! CandidateSet -> submit -> (async) -> ResultListener -> SurfaceDispatcher
//!                                                   \-> ActivationGate -> Sequencer -> canary
//! ```

mod binder;
mod canary;
mod config;
mod context;
mod dispatcher;
mod gate;
mod listener;
mod orchestrator;
mod sequencer;
mod surface;

pub use binder::{ServiceBinder, ServiceConnectionState};
pub use canary::{Canary, CanaryError, CanaryFuture, CanaryRoute, HttpCanary};
pub use config::OrchestratorConfig;
pub use context::ActivationContext;
pub use dispatcher::{DispatchOutcome, SurfaceDispatcher};
pub use gate::ActivationGate;
pub use listener::{DeliveryOutcome, ResultListener, Subscription};
pub use orchestrator::Orchestrator;
pub use sequencer::{EngineActivationSequencer, SequenceOutcome};
pub use surface::{ActivationObserver, Surface, SurfaceKind};

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActivationError {
    #[error("Validation service not bound")]
    NotBound,

    #[error("No activation within {0:?}")]
    Timeout(Duration),

    #[error("Orchestrator shut down")]
    ShutDown,

    #[error("Validation error: {0}")]
    Validation(#[from] envoy_validation::ValidationError),

    #[error("Engine error: {0}")]
    Engine(#[from] envoy_engine::EngineError),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ActivationError>;
