//! UI surfaces and the activation-notification capability

use std::fmt;
use std::str::FromStr;

use envoy_core::ValidationEvent;
use serde::{Deserialize, Serialize};

/// The demo's transport pages, in tab order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurfaceKind {
    /// Custom network engine
    Engine,
    /// General-purpose HTTP client
    HttpClient,
    /// Embedded browser view
    BrowserView,
    /// Queued request library
    RequestQueue,
    /// Raw socket connection
    RawConnection,
    /// No-op page
    Placeholder,
}

impl SurfaceKind {
    pub const ALL: [SurfaceKind; 6] = [
        Self::Engine,
        Self::HttpClient,
        Self::BrowserView,
        Self::RequestQueue,
        Self::RawConnection,
        Self::Placeholder,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Engine => "Engine",
            Self::HttpClient => "HTTP Client",
            Self::BrowserView => "Browser View",
            Self::RequestQueue => "Request Queue",
            Self::RawConnection => "Raw Connection",
            Self::Placeholder => "Placeholder",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Engine => "engine",
            Self::HttpClient => "http-client",
            Self::BrowserView => "browser-view",
            Self::RequestQueue => "request-queue",
            Self::RawConnection => "raw-connection",
            Self::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurfaceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown surface: {}", s))
    }
}

/// Capability implemented by pages that react to validation events
pub trait ActivationObserver: Send + Sync {
    /// Called synchronously on the delivering task; keep it short
    fn on_validation_event(&self, event: &ValidationEvent);
}

/// A page that can be visible
pub trait Surface: Send + Sync {
    fn kind(&self) -> SurfaceKind;

    /// `Some` only for pages that care about validation events
    fn activation_observer(&self) -> Option<&dyn ActivationObserver> {
        None
    }
}
