//! Network engine bound to one egress route

use std::collections::HashMap;

use reqwest::{Client, Method};
use tracing::debug;
use url::Url;

use crate::{EngineConfig, EngineError, Result};

const HEADER_PREFIX: &str = "header_";

/// Where requests actually go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EgressRoute {
    /// SOCKS proxy; requests keep their own target URL
    Socks(Url),
    /// Envoy HTTP front; requests are sent to `base` and name the real target
    /// in `Url-Orig` / `Host-Orig`
    EnvoyFront {
        base: Url,
        extra_headers: Vec<(String, String)>,
    },
}

impl EgressRoute {
    /// Derive the route from an egress URL
    pub fn parse(egress_url: &str) -> Result<Self> {
        let url = Url::parse(egress_url.trim())?;
        match url.scheme() {
            "socks5" | "socks5h" | "socks4" | "socks4a" => {
                if url.host_str().is_none() || url.port().is_none() {
                    return Err(EngineError::InvalidEgress(format!(
                        "SOCKS egress needs host and port: {}",
                        egress_url
                    )));
                }
                Ok(Self::Socks(url))
            }
            "http" | "https" => Ok(Self::EnvoyFront {
                extra_headers: header_params(&url),
                base: url,
            }),
            "envoy" => {
                // envoy://?url=<front>&header_X=... or envoy://host/path
                let front = url
                    .query_pairs()
                    .find(|(k, _)| k == "url")
                    .map(|(_, v)| v.into_owned());
                let base = match front {
                    Some(front) => Url::parse(&front)?,
                    None => envoy_as_https(&url)?,
                };
                if base.host_str().is_none() {
                    return Err(EngineError::InvalidEgress(format!(
                        "Envoy egress has no front host: {}",
                        egress_url
                    )));
                }
                Ok(Self::EnvoyFront {
                    extra_headers: header_params(&url),
                    base,
                })
            }
            other => Err(EngineError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// `envoy://host[:port]/path?query` read as `https://...`
fn envoy_as_https(url: &Url) -> Result<Url> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| EngineError::InvalidEgress(format!("Envoy egress has no front host: {}", url)))?;

    let mut rebuilt = format!("https://{}", host);
    if let Some(port) = url.port() {
        rebuilt.push_str(&format!(":{}", port));
    }
    rebuilt.push_str(url.path());
    if let Some(query) = url.query() {
        rebuilt.push('?');
        rebuilt.push_str(query);
    }
    Ok(Url::parse(&rebuilt)?)
}

/// `header_<Name>=<value>` query parameters become `<Name>: <value>`
fn header_params(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .filter_map(|(k, v)| {
            k.strip_prefix(HEADER_PREFIX)
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_string(), v.into_owned()))
        })
        .collect()
}

/// HTTP response fetched through the engine
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl EngineResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Engine configured with a single egress path
pub struct NetworkEngine {
    config: EngineConfig,
    route: EgressRoute,
    client: Client,
}

impl std::fmt::Debug for NetworkEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkEngine")
            .field("egress_url", &self.config.egress_url)
            .field("route", &self.route)
            .finish()
    }
}

impl NetworkEngine {
    /// Build an engine; fails if the egress URL cannot be routed
    pub fn build(config: EngineConfig) -> Result<Self> {
        let route = EgressRoute::parse(&config.egress_url)?;

        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .brotli(config.brotli)
            .gzip(config.gzip);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        builder = match &route {
            EgressRoute::Socks(proxy) => builder.proxy(reqwest::Proxy::all(proxy.as_str())?),
            EgressRoute::EnvoyFront { .. } => builder.no_proxy(),
        };
        let client = builder.build()?;

        debug!("Built network engine for {}", config.egress_url);
        Ok(Self { config, route, client })
    }

    pub fn egress_url(&self) -> &str {
        &self.config.egress_url
    }

    pub fn route(&self) -> &EgressRoute {
        &self.route
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Short identifier logged after a build
    pub fn version_string(&self) -> String {
        let route = match self.route {
            EgressRoute::Socks(_) => "socks",
            EgressRoute::EnvoyFront { .. } => "envoy-front",
        };
        format!("envoy-engine/{} ({})", env!("CARGO_PKG_VERSION"), route)
    }

    /// Resolve the URL to send to and the headers to send with it
    ///
    /// Caller `accept-encoding` headers are dropped; the client negotiates
    /// encoding itself.
    pub fn plan_request(&self, target: &Url, headers: &[(String, String)]) -> (Url, Vec<(String, String)>) {
        let mut out: Vec<(String, String)> = headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("accept-encoding"))
            .cloned()
            .collect();

        match &self.route {
            EgressRoute::Socks(_) => (target.clone(), out),
            EgressRoute::EnvoyFront { base, extra_headers } => {
                out.extend(extra_headers.iter().cloned());
                out.push(("Url-Orig".to_string(), target.to_string()));
                out.push((
                    "Host-Orig".to_string(),
                    target.host_str().unwrap_or_default().to_string(),
                ));
                (base.clone(), out)
            }
        }
    }

    /// Send a request through the egress route
    pub async fn execute(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: Option<Vec<u8>>,
    ) -> Result<EngineResponse> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| EngineError::UnsupportedMethod(method.to_string()))?;
        let target = Url::parse(url)?;
        let (send_to, headers) = self.plan_request(&target, headers);

        debug!("{} {} via {}", method, target, send_to);
        let mut req = self.client.request(method, send_to);
        for (key, value) in &headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if let Some(body) = body {
            req = req.body(body);
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string(), v.to_string());
            }
        }
        let body = response.bytes().await?.to_vec();

        Ok(EngineResponse { status, headers, body })
    }

    pub async fn get(&self, url: &str) -> Result<EngineResponse> {
        self.execute("GET", url, &[], None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_socks_route() {
        let route = EgressRoute::parse("socks5://127.0.0.1:1080").unwrap();
        assert!(matches!(route, EgressRoute::Socks(_)));
    }

    #[test]
    fn test_socks_route_requires_port() {
        assert!(EgressRoute::parse("socks5://127.0.0.1").is_err());
    }

    #[test]
    fn test_https_route_collects_header_params() {
        let route =
            EgressRoute::parse("https://allowed.example.com/path/?header_Host=cdn.example.com&x=1&header_=skip")
                .unwrap();
        match route {
            EgressRoute::EnvoyFront { base, extra_headers } => {
                assert_eq!(base.host_str(), Some("allowed.example.com"));
                assert_eq!(extra_headers, vec![("Host".to_string(), "cdn.example.com".to_string())]);
            }
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn test_envoy_route_with_url_param() {
        let route = EgressRoute::parse(
            "envoy://?url=https%3A%2F%2Ffront.example.net%2Fproxy%2F&header_X-Key=abc",
        )
        .unwrap();
        match route {
            EgressRoute::EnvoyFront { base, extra_headers } => {
                assert_eq!(base.as_str(), "https://front.example.net/proxy/");
                assert_eq!(header(&extra_headers, "X-Key"), Some("abc"));
            }
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn test_envoy_route_without_url_param_maps_to_https() {
        match EgressRoute::parse("envoy://front.example.net/p/").unwrap() {
            EgressRoute::EnvoyFront { base, .. } => {
                assert_eq!(base.as_str(), "https://front.example.net/p/");
            }
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn test_envoy_route_ignores_stripped_whitespace() {
        match EgressRoute::parse("en\tvoy://front.example.net:8443/p/?header_X-Key=abc").unwrap() {
            EgressRoute::EnvoyFront { base, extra_headers } => {
                assert_eq!(base.scheme(), "https");
                assert_eq!(base.as_str(), "https://front.example.net:8443/p/?header_X-Key=abc");
                assert_eq!(header(&extra_headers, "X-Key"), Some("abc"));
            }
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn test_envoy_route_without_host_is_rejected() {
        assert!(matches!(
            EgressRoute::parse("envoy:///p/"),
            Err(EngineError::InvalidEgress(_))
        ));
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(matches!(
            EgressRoute::parse("ftp://example.com/"),
            Err(EngineError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_plan_request_envoy_front() {
        let engine = NetworkEngine::build(EngineConfig::new(
            "https://allowed.example.com/path/?header_Host=cdn.example.com",
        ))
        .unwrap();
        let target = Url::parse("https://api.ipify.org/").unwrap();
        let caller = vec![
            ("Accept-Encoding".to_string(), "br".to_string()),
            ("Accept".to_string(), "text/plain".to_string()),
        ];

        let (send_to, headers) = engine.plan_request(&target, &caller);

        assert_eq!(send_to.as_str(), "https://allowed.example.com/path/?header_Host=cdn.example.com");
        assert_eq!(header(&headers, "Accept-Encoding"), None);
        assert_eq!(header(&headers, "Accept"), Some("text/plain"));
        assert_eq!(header(&headers, "Host"), Some("cdn.example.com"));
        assert_eq!(header(&headers, "Url-Orig"), Some("https://api.ipify.org/"));
        assert_eq!(header(&headers, "Host-Orig"), Some("api.ipify.org"));
    }

    #[test]
    fn test_plan_request_socks_keeps_target() {
        let engine = NetworkEngine::build(EngineConfig::new("socks5://127.0.0.1:1080")).unwrap();
        let target = Url::parse("https://api.ipify.org/").unwrap();

        let (send_to, headers) = engine.plan_request(&target, &[]);

        assert_eq!(send_to, target);
        assert!(headers.is_empty());
        assert!(engine.version_string().contains("socks"));
    }

    #[tokio::test]
    async fn test_execute_rejects_bad_method() {
        let engine = NetworkEngine::build(EngineConfig::new("https://allowed.example.com/")).unwrap();
        let result = engine.execute("GET POST", "https://example.com/", &[], None).await;
        assert!(matches!(result, Err(EngineError::UnsupportedMethod(_))));
    }
}
