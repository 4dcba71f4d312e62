//! Envoy Core
//!
//! Shared types for egress validation and activation.
//!
//! ## Types
//!
//! - **CandidateDescriptor / CandidateSet**: egress paths submitted in one
//!   validation round
//! - **CandidateListBuilder**: assembles a `CandidateSet` from a local
//!   front-end and remote probe targets
//! - **ValidationEvent**: the success notification emitted by a prober
//! - **ActivationState**: `inactive` or `active(url)`, single transition

mod activation;
mod types;

pub use activation::{ActivationState, ValidationEvent, ValidationPayload};
pub use types::{
    CandidateDescriptor, CandidateKind, CandidateListBuilder, CandidateSet, LocalFrontEnd,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid front-end address: {0}")]
    InvalidFrontEnd(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
