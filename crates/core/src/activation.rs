//! Validation events and activation state

use serde::{Deserialize, Serialize};

/// Success notification emitted by a prober
///
/// `url` carries the winning egress URL. `None` or an empty string is a
/// valid "no winner yet" observation, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationEvent {
    #[serde(default)]
    pub url: Option<String>,
}

impl ValidationEvent {
    pub fn winner(url: impl Into<String>) -> Self {
        Self { url: Some(url.into()) }
    }

    pub fn empty() -> Self {
        Self { url: None }
    }

    /// Classify the payload
    pub fn payload(&self) -> ValidationPayload {
        match self.url.as_deref().map(str::trim) {
            None | Some("") => ValidationPayload::Empty,
            Some(url) => match url::Url::parse(url) {
                Ok(_) => ValidationPayload::Winner(url.to_string()),
                Err(e) => ValidationPayload::Malformed(format!("{}: {}", url, e)),
            },
        }
    }
}

/// Classified validation payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationPayload {
    /// Non-empty absolute URL
    Winner(String),
    /// Missing or empty
    Empty,
    /// Present but not an absolute URL (carries a description)
    Malformed(String),
}

/// Process-wide activation state
///
/// Transitions `Inactive -> Active` exactly once; there is no way back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "url", rename_all = "lowercase")]
pub enum ActivationState {
    #[default]
    Inactive,
    Active(String),
}

impl ActivationState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Winning URL once active
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Active(url) => Some(url),
            Self::Inactive => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_classification() {
        assert_eq!(
            ValidationEvent::winner("socks5://127.0.0.1:1080").payload(),
            ValidationPayload::Winner("socks5://127.0.0.1:1080".to_string())
        );
        assert_eq!(ValidationEvent::empty().payload(), ValidationPayload::Empty);
        assert_eq!(ValidationEvent::winner("").payload(), ValidationPayload::Empty);
        assert_eq!(ValidationEvent::winner("   ").payload(), ValidationPayload::Empty);
        assert!(matches!(
            ValidationEvent::winner("127.0.0.1 1080").payload(),
            ValidationPayload::Malformed(_)
        ));
    }

    #[test]
    fn test_event_json_shape() {
        let event: ValidationEvent = serde_json::from_str(r#"{"url":"https://a.example/"}"#).unwrap();
        assert_eq!(event, ValidationEvent::winner("https://a.example/"));

        let event: ValidationEvent = serde_json::from_str("{}").unwrap();
        assert_eq!(event.payload(), ValidationPayload::Empty);
    }

    #[test]
    fn test_activation_state() {
        let state = ActivationState::default();
        assert!(!state.is_active());
        assert_eq!(state.url(), None);

        let state = ActivationState::Active("socks5://127.0.0.1:1080".to_string());
        assert!(state.is_active());
        assert_eq!(state.url(), Some("socks5://127.0.0.1:1080"));
    }

    #[test]
    fn test_activation_state_serialization() {
        assert_eq!(
            serde_json::to_string(&ActivationState::Inactive).unwrap(),
            r#"{"state":"inactive"}"#
        );
        assert_eq!(
            serde_json::to_string(&ActivationState::Active("https://a.example/".into())).unwrap(),
            r#"{"state":"active","url":"https://a.example/"}"#
        );
    }
}
