//! Envoy Logging
//!
//! One place to set up `tracing` output for the demo shell and tests.
//!
//! ## Usage
//!
//! ```no_run
//! use envoy_logging::{init, LogLevel};
//!
//! init(LogLevel::from_verbosity(1));
//! ```
//!
//! `RUST_LOG` always wins over the level passed in code.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Minimum level to emit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// `-v` maps to debug, no flag to info
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Self::Debug
        } else {
            Self::Info
        }
    }

    /// Count of `-v` flags: 0 → info, 1 → debug, 2+ → trace
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => Self::Info,
            1 => Self::Debug,
            _ => Self::Trace,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.as_str()))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// Install the global subscriber
///
/// # Panics
///
/// Panics if a subscriber is already installed. Use [`try_init`] otherwise.
pub fn init(level: LogLevel) {
    try_init(level).expect("Failed to initialize logging");
}

/// Install the global subscriber, reporting failure instead of panicking
pub fn try_init(level: LogLevel) -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(level.filter())
        .with_target(false)
        .try_init()
        .map_err(|e| e.to_string())
}

/// Like [`try_init`], but prints the emitting module of each event
pub fn try_init_with_target(level: LogLevel, show_target: bool) -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(level.filter())
        .with_target(show_target)
        .try_init()
        .map_err(|e| e.to_string())
}

/// Route output through the test harness; safe to call from every test
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
