//! Reference prober: concurrent candidate testing

use std::sync::Arc;
use std::time::Duration;

use envoy_core::{CandidateDescriptor, CandidateKind, CandidateSet, ValidationEvent};
use envoy_engine::{EngineConfig, NetworkEngine};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{Result, StatusQuery, ValidationError, ValidationProber, ValidationReceiver};

/// Probe settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Fetched through each candidate; any 2xx/3xx counts as reachable
    pub probe_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            probe_url: "https://www.gstatic.com/generate_204".to_string(),
            timeout_secs: 10,
            user_agent: "curl/7.66.0".to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<ValidationEvent>>>>;

/// Concurrent candidate prober
pub struct ValidationService {
    config: ProbeConfig,
    valid_urls: Arc<RwLock<Vec<String>>>,
    subscribers: Subscribers,
}

impl ValidationService {
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            valid_urls: Arc::new(RwLock::new(Vec::new())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Forget every URL validated so far
    pub fn reset(&self) {
        self.valid_urls.write().clear();
    }

    /// Live subscriber count; closed receivers are pruned on the next delivery
    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.subscribers.lock();
        subs.retain(|tx| !tx.is_closed());
        subs.len()
    }

    /// Like `submit`, but reports a missing runtime instead of logging it
    pub fn try_submit(&self, candidates: CandidateSet) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| ValidationError::NoRuntime)?;

        let config = self.config.clone();
        let valid_urls = self.valid_urls.clone();
        let subscribers = self.subscribers.clone();
        info!("Submitting {} candidate(s) for validation", candidates.len());

        handle.spawn(async move {
            let total = candidates.len();
            let probes = candidates.iter().cloned().map(|candidate| {
                let config = config.clone();
                let valid_urls = valid_urls.clone();
                let subscribers = subscribers.clone();
                async move {
                    match probe_candidate(&config, &candidate).await {
                        Ok(()) => {
                            record_valid(&valid_urls, &subscribers, candidate.as_str());
                            true
                        }
                        Err(e) => {
                            debug!("Candidate {} failed: {}", candidate, e);
                            false
                        }
                    }
                }
            });
            let results = futures::future::join_all(probes).await;
            let valid = results.into_iter().filter(|ok| *ok).count();
            info!("Validation round finished: {}/{} candidate(s) valid", valid, total);
        });

        Ok(())
    }
}

impl Default for ValidationService {
    fn default() -> Self {
        Self::new(ProbeConfig::default())
    }
}

/// Fetch the probe URL through one candidate
async fn probe_candidate(config: &ProbeConfig, candidate: &CandidateDescriptor) -> Result<()> {
    match candidate.kind() {
        CandidateKind::Unknown => {
            return Err(ValidationError::ProbeFailed("unrecognized scheme".to_string()));
        }
        CandidateKind::LocalProxy if candidate.scheme().as_deref() == Some("ss") => {
            return Err(ValidationError::ProbeFailed(
                "ss:// needs a local front-end; submit its socks5:// address instead".to_string(),
            ));
        }
        _ => {}
    }

    let engine = NetworkEngine::build(
        EngineConfig::new(candidate.as_str())
            .with_user_agent(config.user_agent.clone())
            .with_timeout(Some(config.timeout())),
    )?;

    let response = tokio::time::timeout(config.timeout(), engine.get(&config.probe_url))
        .await
        .map_err(|_| ValidationError::ProbeFailed(format!("timed out after {:?}", config.timeout())))??;

    if (200..400).contains(&response.status) {
        debug!("Candidate {} reachable (status {})", candidate, response.status);
        Ok(())
    } else {
        Err(ValidationError::ProbeFailed(format!("status {}", response.status)))
    }
}

fn record_valid(valid_urls: &RwLock<Vec<String>>, subscribers: &Subscribers, url: &str) {
    {
        let mut urls = valid_urls.write();
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    info!("Validated {}", url);

    let event = ValidationEvent::winner(url);
    let mut subs = subscribers.lock();
    subs.retain(|tx| tx.send(event.clone()).is_ok());
    if subs.is_empty() {
        warn!("No subscribers for validated url {}", url);
    }
}

impl ValidationProber for ValidationService {
    fn submit(&self, candidates: CandidateSet) {
        if let Err(e) = self.try_submit(candidates) {
            warn!("Validation not started: {}", e);
        }
    }

    fn subscribe(&self) -> ValidationReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }
}

impl StatusQuery for ValidationService {
    fn known_valid_urls(&self) -> Vec<String> {
        self.valid_urls.read().clone()
    }
}
