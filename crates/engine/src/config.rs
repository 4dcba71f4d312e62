use std::time::Duration;

use serde::Deserialize;

/// Engine build settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Validated egress URL; every request is routed through it
    pub egress_url: String,
    pub user_agent: String,
    pub brotli: bool,
    pub gzip: bool,
    /// Per-request timeout in seconds; `None` keeps reqwest's default
    pub timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            egress_url: String::new(),
            user_agent: "curl/7.66.0".to_string(),
            brotli: true,
            gzip: true,
            timeout_secs: Some(30),
        }
    }
}

impl EngineConfig {
    pub fn new(egress_url: impl Into<String>) -> Self {
        Self {
            egress_url: egress_url.into(),
            ..Default::default()
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_secs = timeout.map(|t| t.as_secs());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
