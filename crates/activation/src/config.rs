//! Orchestrator configuration

use std::path::Path;
use std::time::Duration;

use envoy_core::{CandidateListBuilder, CandidateSet, LocalFrontEnd};
use envoy_engine::EngineConfig;
use envoy_validation::ProbeConfig;
use serde::Deserialize;

use crate::{ActivationError, CanaryRoute, HttpCanary, Result};

/// Everything the orchestrator and its collaborators are built from
///
/// Every field has a default, so a config file only names what it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Local proxy front-end, submitted first
    pub front_end: LocalFrontEnd,
    /// Remote probe targets, submitted after the front-end
    pub targets: Vec<String>,
    /// User agent the engine is configured with
    pub user_agent: String,
    pub canary_endpoint: String,
    pub canary_route: CanaryRoute,
    /// How long `wait_for_activation` waits; `None` waits forever
    pub validation_timeout_secs: Option<u64>,
    pub probe: ProbeConfig,
    /// Template for the activated engine (timeouts, encodings)
    pub engine: EngineConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            front_end: LocalFrontEnd::default(),
            targets: vec!["https://allowed.example.com/path/".to_string()],
            user_agent: "curl/7.66.0".to_string(),
            canary_endpoint: HttpCanary::DEFAULT_ENDPOINT.to_string(),
            canary_route: CanaryRoute::default(),
            validation_timeout_secs: Some(60),
            probe: ProbeConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(ActivationError::Config("user_agent must not be empty".to_string()));
        }
        if self.validation_timeout_secs == Some(0) {
            return Err(ActivationError::Config(
                "validation_timeout_secs must be positive (omit it to wait forever)".to_string(),
            ));
        }
        if self.front_end.port == 0 {
            return Err(ActivationError::Config("front_end.port must not be 0".to_string()));
        }
        Ok(())
    }

    pub fn validation_timeout(&self) -> Option<Duration> {
        self.validation_timeout_secs.map(Duration::from_secs)
    }

    /// Candidate set for one validation round
    pub fn candidates(&self) -> CandidateSet {
        CandidateListBuilder::new()
            .local_front_end(self.front_end.clone())
            .targets(self.targets.iter().map(String::as_str))
            .build()
    }

    pub fn canary(&self) -> HttpCanary {
        let canary = HttpCanary::new(self.canary_endpoint.clone(), self.canary_route);
        match self.engine.timeout() {
            Some(timeout) => canary.with_timeout(timeout),
            None => canary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_candidates() {
        let config = OrchestratorConfig::default();
        assert_eq!(
            config.candidates().urls(),
            vec!["socks5://127.0.0.1:1080", "https://allowed.example.com/path/"]
        );
        assert_eq!(config.validation_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.canary_route, CanaryRoute::Engine);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_file_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "front_end": {{"scheme": "socks5h", "host": "localhost", "port": 9050}},
                "targets": [],
                "canary_route": "direct",
                "validation_timeout_secs": null,
                "probe": {{"timeout_secs": 3}}
            }}"#
        )
        .unwrap();

        let config = OrchestratorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.candidates().urls(), vec!["socks5h://localhost:9050"]);
        assert_eq!(config.canary_route, CanaryRoute::Direct);
        assert_eq!(config.validation_timeout(), None);
        assert_eq!(config.probe.timeout_secs, 3);
        assert_eq!(config.user_agent, "curl/7.66.0");
    }

    #[test]
    fn test_invalid_configs() {
        let config = OrchestratorConfig {
            validation_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ActivationError::Config(_))));

        let config = OrchestratorConfig {
            user_agent: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = OrchestratorConfig::from_json_file(Path::new("/nonexistent/envoy.json"));
        assert!(matches!(result, Err(ActivationError::Io(_))));
    }
}
