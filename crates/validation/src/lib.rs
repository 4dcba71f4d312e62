//! Envoy Validation
//!
//! The probing side of egress activation.
//!
//! ## Interfaces
//!
//! - **ValidationProber**: accepts a `CandidateSet` (fire-and-forget) and
//!   delivers `ValidationEvent`s to explicit subscribers
//! - **StatusQuery**: synchronous snapshot of the URLs known to be valid
//! - **ServiceConnector**: bind/unbind boundary to a prober process
//!
//! ## Reference implementation
//!
//! `ValidationService` tests every candidate concurrently by building a
//! throwaway engine for it and fetching `ProbeConfig::probe_url` through it.

mod connector;
mod service;

pub use connector::{ConnectedCallback, LocalConnector, ServiceConnector};
pub use service::{ProbeConfig, ValidationService};

use envoy_core::{CandidateSet, ValidationEvent};
use thiserror::Error;
use tokio::sync::mpsc;

/// Receiving end of a prober subscription
pub type ValidationReceiver = mpsc::UnboundedReceiver<ValidationEvent>;

/// Submits candidate sets and publishes winners
pub trait ValidationProber: Send + Sync {
    /// Start testing every candidate; returns immediately
    fn submit(&self, candidates: CandidateSet);

    /// New subscription; dropping the receiver unsubscribes
    fn subscribe(&self) -> ValidationReceiver;
}

/// Synchronous status queries on a bound prober
pub trait StatusQuery: Send + Sync {
    /// Snapshot of URLs validated so far; may be empty
    fn known_valid_urls(&self) -> Vec<String>;
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Bind failed: {0}")]
    BindFailed(String),

    #[error("No async runtime available")]
    NoRuntime,

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Engine error: {0}")]
    Engine(#[from] envoy_engine::EngineError),
}

pub type Result<T> = std::result::Result<T, ValidationError>;
