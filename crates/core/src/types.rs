use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// How a candidate is tested, derived from its scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// Local proxy front-end (socks5, socks5h, socks4, ss)
    LocalProxy,
    /// Remote probe target reached directly (http, https, envoy)
    RemoteTarget,
    /// Anything else; probers skip it
    Unknown,
}

impl CandidateKind {
    /// Classify a URL scheme
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "socks5" | "socks5h" | "socks4" | "socks4a" | "ss" => Self::LocalProxy,
            "http" | "https" | "envoy" => Self::RemoteTarget,
            _ => Self::Unknown,
        }
    }
}

/// One egress path proposed for validation
///
/// Either a local proxy front-end (`socks5://127.0.0.1:1080`) or a remote
/// probe target (`https://allowed.example.com/path/`). Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateDescriptor(String);

impl CandidateDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scheme portion of the descriptor, lowercased, if it has one
    pub fn scheme(&self) -> Option<String> {
        self.0
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .filter(|s| !s.is_empty())
    }

    pub fn kind(&self) -> CandidateKind {
        self.scheme()
            .map(|s| CandidateKind::from_scheme(&s))
            .unwrap_or(CandidateKind::Unknown)
    }

    /// Parse as an absolute URL
    pub fn to_url(&self) -> crate::Result<url::Url> {
        Ok(url::Url::parse(&self.0)?)
    }
}

impl fmt::Display for CandidateDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateDescriptor {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CandidateDescriptor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Ordered, read-only set of candidates submitted in one validation round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateSet {
    candidates: Vec<CandidateDescriptor>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateDescriptor> {
        self.candidates.iter()
    }

    pub fn as_slice(&self) -> &[CandidateDescriptor] {
        &self.candidates
    }

    /// Plain URL strings, in insertion order
    pub fn urls(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.as_str().to_string()).collect()
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a CandidateDescriptor;
    type IntoIter = std::slice::Iter<'a, CandidateDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// Address of the local proxy front-end (e.g. a SOCKS listener started by
/// the proxy-local service)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFrontEnd {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl LocalFrontEnd {
    pub fn socks5(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: "socks5".to_string(),
            host: host.into(),
            port,
        }
    }

    pub fn to_descriptor(&self) -> CandidateDescriptor {
        CandidateDescriptor::new(self.to_string())
    }
}

impl Default for LocalFrontEnd {
    fn default() -> Self {
        Self::socks5("127.0.0.1", 1080)
    }
}

impl fmt::Display for LocalFrontEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl FromStr for LocalFrontEnd {
    type Err = CoreError;

    /// Accepts `scheme://host:port` or bare `host:port` (socks5 assumed)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = match s.split_once("://") {
            Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
            None => ("socks5".to_string(), s),
        };
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| CoreError::InvalidFrontEnd(format!("missing port in {}", s)))?;
        if host.is_empty() {
            return Err(CoreError::InvalidFrontEnd(format!("missing host in {}", s)));
        }
        let port = port
            .trim_end_matches('/')
            .parse::<u16>()
            .map_err(|e| CoreError::InvalidFrontEnd(format!("bad port in {}: {}", s, e)))?;

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
        })
    }
}

/// Builds a `CandidateSet`: local front-ends first, then remote targets,
/// each group in insertion order. Pure; never fails.
#[derive(Debug, Clone, Default)]
pub struct CandidateListBuilder {
    front_ends: Vec<LocalFrontEnd>,
    targets: Vec<CandidateDescriptor>,
}

impl CandidateListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a local front-end; repeated calls keep every one
    pub fn local_front_end(mut self, front_end: LocalFrontEnd) -> Self {
        self.front_ends.push(front_end);
        self
    }

    pub fn target(mut self, target: impl Into<CandidateDescriptor>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn targets<I, T>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<CandidateDescriptor>,
    {
        self.targets.extend(targets.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> CandidateSet {
        let mut candidates = Vec::with_capacity(self.front_ends.len() + self.targets.len());
        candidates.extend(self.front_ends.iter().map(LocalFrontEnd::to_descriptor));
        candidates.extend(self.targets);
        CandidateSet { candidates }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_puts_front_end_first() {
        let set = CandidateListBuilder::new()
            .target("https://allowed.example.com/path/")
            .local_front_end(LocalFrontEnd::socks5("127.0.0.1", 1080))
            .build();

        assert_eq!(
            set.urls(),
            vec!["socks5://127.0.0.1:1080", "https://allowed.example.com/path/"]
        );
    }

    #[test]
    fn test_builder_keeps_duplicates_and_order() {
        let set = CandidateListBuilder::new()
            .targets(["https://b.example/", "https://a.example/", "https://b.example/"])
            .build();

        assert_eq!(set.len(), 3);
        assert_eq!(set.as_slice()[0].as_str(), "https://b.example/");
        assert_eq!(set.as_slice()[2].as_str(), "https://b.example/");
    }

    #[test]
    fn test_builder_keeps_every_front_end() {
        let set = CandidateListBuilder::new()
            .local_front_end(LocalFrontEnd::socks5("127.0.0.1", 1080))
            .target("https://allowed.example.com/path/")
            .local_front_end(LocalFrontEnd::socks5("127.0.0.1", 9050))
            .local_front_end(LocalFrontEnd::socks5("127.0.0.1", 1080))
            .build();

        assert_eq!(
            set.urls(),
            vec![
                "socks5://127.0.0.1:1080",
                "socks5://127.0.0.1:9050",
                "socks5://127.0.0.1:1080",
                "https://allowed.example.com/path/",
            ]
        );
    }

    #[test]
    fn test_empty_builder() {
        let set = CandidateListBuilder::new().build();
        assert!(set.is_empty());
    }

    #[test]
    fn test_candidate_kind() {
        assert_eq!(CandidateDescriptor::from("socks5://127.0.0.1:1080").kind(), CandidateKind::LocalProxy);
        assert_eq!(CandidateDescriptor::from("SOCKS5H://localhost:9050").kind(), CandidateKind::LocalProxy);
        assert_eq!(CandidateDescriptor::from("https://example.com/").kind(), CandidateKind::RemoteTarget);
        assert_eq!(CandidateDescriptor::from("envoy://?url=x").kind(), CandidateKind::RemoteTarget);
        assert_eq!(CandidateDescriptor::from("ftp://example.com").kind(), CandidateKind::Unknown);
        assert_eq!(CandidateDescriptor::from("not a url").kind(), CandidateKind::Unknown);
    }

    #[test]
    fn test_front_end_parse() {
        let fe: LocalFrontEnd = "127.0.0.1:1080".parse().unwrap();
        assert_eq!(fe, LocalFrontEnd::default());

        let fe: LocalFrontEnd = "socks5h://localhost:9050".parse().unwrap();
        assert_eq!(fe.to_string(), "socks5h://localhost:9050");

        assert!("127.0.0.1".parse::<LocalFrontEnd>().is_err());
        assert!(":1080".parse::<LocalFrontEnd>().is_err());
        assert!("127.0.0.1:99999".parse::<LocalFrontEnd>().is_err());
    }

    #[test]
    fn test_candidate_set_serializes_as_list() {
        let set = CandidateListBuilder::new()
            .local_front_end(LocalFrontEnd::default())
            .build();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["socks5://127.0.0.1:1080"]"#);
    }
}
