//! Envoy Network Engine
//!
//! HTTP engine that sends every request through one validated egress path.
//!
//! ## Egress routes
//!
//! - **SOCKS** (`socks5://`, `socks5h://`, `socks4://`): installed as the
//!   client's proxy; requests go straight to their target through it
//! - **Envoy front** (`https://`, `http://`, `envoy://`): requests are sent to
//!   the front itself with `Url-Orig` / `Host-Orig` naming the real target,
//!   plus one header per `header_<Name>=<value>` query parameter
//!
//! ## Engine slot
//!
//! `EngineSlot` holds at most one engine for the lifetime of its owner and is
//! injected wherever the engine is needed. `EngineProvider` is the narrow
//! interface the activation core configures it through.

mod config;
mod engine;
mod slot;

pub use config::EngineConfig;
pub use engine::{EgressRoute, EngineResponse, NetworkEngine};
pub use slot::{EngineProvider, EngineSlot};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid egress URL: {0}")]
    InvalidEgress(String),

    #[error("Unsupported egress scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("Engine not initialized")]
    NotInitialized,
}

pub type Result<T> = std::result::Result<T, EngineError>;
