//! Post-activation reachability check

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use envoy_engine::NetworkEngine;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Canary failure classes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanaryError {
    /// The endpoint could not be turned into a request; never expected for
    /// the built-in literal
    #[error("Malformed canary target: {0}")]
    MalformedTarget(String),

    /// Transient network failure; not retried
    #[error("Canary I/O failure: {0}")]
    Io(String),
}

pub type CanaryFuture<'a> = Pin<Box<dyn Future<Output = Result<String, CanaryError>> + Send + 'a>>;

/// Which client the canary request uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanaryRoute {
    /// Plain client, independent of engine wiring
    Direct,
    /// Through the freshly configured engine
    #[default]
    Engine,
}

impl FromStr for CanaryRoute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "engine" => Ok(Self::Engine),
            other => Err(format!("unknown canary route: {}", other)),
        }
    }
}

/// One diagnostic request after activation
pub trait Canary: Send + Sync {
    /// Run the check; `engine` is the configured engine, if the provider
    /// exposes one. Resolves to the response body.
    fn check(&self, engine: Option<Arc<NetworkEngine>>) -> CanaryFuture<'_>;
}

/// GET a fixed "what is my IP" style endpoint
pub struct HttpCanary {
    endpoint: String,
    route: CanaryRoute,
    client: reqwest::Client,
}

impl HttpCanary {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.ipify.org/";

    pub fn new(endpoint: impl Into<String>, route: CanaryRoute) -> Self {
        Self {
            endpoint: endpoint.into(),
            route,
            client: direct_client(None),
        }
    }

    /// Bound the direct client's requests
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = direct_client(Some(timeout));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn route(&self) -> CanaryRoute {
        self.route
    }

    async fn run(&self, engine: Option<Arc<NetworkEngine>>) -> Result<String, CanaryError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| CanaryError::MalformedTarget(format!("{}: {}", self.endpoint, e)))?;

        match (self.route, engine) {
            (CanaryRoute::Engine, Some(engine)) => {
                let response = engine
                    .get(url.as_str())
                    .await
                    .map_err(|e| CanaryError::Io(e.to_string()))?;
                if !response.is_success() {
                    return Err(CanaryError::Io(format!("status {}", response.status)));
                }
                Ok(response.text())
            }
            (route, _) => {
                if route == CanaryRoute::Engine {
                    warn!("No engine to route the canary through, using the direct client");
                }
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| CanaryError::Io(e.to_string()))?;
                response.text().await.map_err(|e| CanaryError::Io(e.to_string()))
            }
        }
    }
}

/// Client that ignores system proxy settings
fn direct_client(timeout: Option<Duration>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder().no_proxy();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().unwrap_or_else(|e| {
        warn!("Falling back to default canary client: {}", e);
        reqwest::Client::new()
    })
}

impl Default for HttpCanary {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ENDPOINT, CanaryRoute::default())
    }
}

impl Canary for HttpCanary {
    fn check(&self, engine: Option<Arc<NetworkEngine>>) -> CanaryFuture<'_> {
        Box::pin(self.run(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envoy_engine::EngineConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn spawn_ip_stub(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes()).await;
            }
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_direct_canary_returns_body() {
        let endpoint = spawn_ip_stub("203.0.113.7").await;
        let canary = HttpCanary::new(endpoint, CanaryRoute::Direct);

        assert_eq!(canary.check(None).await, Ok("203.0.113.7".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_target() {
        let canary = HttpCanary::new("not a url", CanaryRoute::Direct);
        assert!(matches!(canary.check(None).await, Err(CanaryError::MalformedTarget(_))));
    }

    #[tokio::test]
    async fn test_io_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let canary = HttpCanary::new(format!("http://{}/", addr), CanaryRoute::Direct)
            .with_timeout(Duration::from_secs(2));
        assert!(matches!(canary.check(None).await, Err(CanaryError::Io(_))));
    }

    #[tokio::test]
    async fn test_engine_route_goes_through_front() {
        // The stub plays the Envoy front; the canary endpoint itself is never resolved
        let front = spawn_ip_stub("198.51.100.2").await;
        let engine = Arc::new(NetworkEngine::build(EngineConfig::new(front)).unwrap());
        let canary = HttpCanary::new("https://ip.invalid/", CanaryRoute::Engine);

        assert_eq!(canary.check(Some(engine)).await, Ok("198.51.100.2".to_string()));
    }

    #[test]
    fn test_route_json() {
        let route: CanaryRoute = serde_json::from_str(r#""direct""#).unwrap();
        assert_eq!(route, CanaryRoute::Direct);
        assert_eq!(HttpCanary::default().route(), CanaryRoute::Engine);
        assert_eq!(HttpCanary::default().endpoint(), "https://api.ipify.org/");
        assert_eq!("Engine".parse::<CanaryRoute>(), Ok(CanaryRoute::Engine));
        assert!("proxy".parse::<CanaryRoute>().is_err());
    }
}
