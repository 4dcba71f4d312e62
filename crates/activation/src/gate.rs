//! At-most-once activation guard

use std::sync::OnceLock;

use envoy_core::ActivationState;
use tokio::sync::watch;
use tracing::info;

/// Single-writer guard over `ActivationState`
///
/// `OnceLock::set` is the atomic check-and-set: exactly one caller observes
/// `inactive` and stores its URL, every other caller is rejected. No I/O
/// happens while deciding.
#[derive(Debug)]
pub struct ActivationGate {
    winner: OnceLock<String>,
    state_tx: watch::Sender<ActivationState>,
}

impl ActivationGate {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ActivationState::Inactive);
        Self {
            winner: OnceLock::new(),
            state_tx,
        }
    }

    /// Attempt the `inactive -> active(url)` transition
    ///
    /// Returns `true` only for the delivery that performed it.
    pub fn try_activate(&self, url: &str) -> bool {
        match self.winner.set(url.to_string()) {
            Ok(()) => {
                info!("Activation gate opened for {}", url);
                self.state_tx.send_replace(ActivationState::Active(url.to_string()));
                true
            }
            Err(rejected) => {
                info!(
                    "Activation already performed with {}, ignoring {}",
                    self.winner.get().map(String::as_str).unwrap_or_default(),
                    rejected
                );
                false
            }
        }
    }

    pub fn state(&self) -> ActivationState {
        match self.winner.get() {
            Some(url) => ActivationState::Active(url.clone()),
            None => ActivationState::Inactive,
        }
    }

    pub fn is_active(&self) -> bool {
        self.winner.get().is_some()
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.get().map(String::as_str)
    }

    /// Watch state changes; the current value is marked seen
    pub fn subscribe(&self) -> watch::Receiver<ActivationState> {
        self.state_tx.subscribe()
    }
}

impl Default for ActivationGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_first_delivery_wins() {
        let gate = ActivationGate::new();
        assert_eq!(gate.state(), ActivationState::Inactive);

        assert!(gate.try_activate("socks5://127.0.0.1:1080"));
        assert!(!gate.try_activate("https://allowed.example.com/path/"));
        assert!(!gate.try_activate("socks5://127.0.0.1:1080"));

        assert_eq!(
            gate.state(),
            ActivationState::Active("socks5://127.0.0.1:1080".to_string())
        );
        assert_eq!(gate.winner(), Some("socks5://127.0.0.1:1080"));
    }

    #[test]
    fn test_racing_threads_single_winner() {
        let gate = Arc::new(ActivationGate::new());
        let wins = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let gate = gate.clone();
                let wins = wins.clone();
                std::thread::spawn(move || {
                    if gate.try_activate(&format!("https://candidate-{}.example/", i)) {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert!(gate.is_active());
    }

    #[tokio::test]
    async fn test_subscribers_see_transition() {
        let gate = ActivationGate::new();
        let mut rx = gate.subscribe();
        assert!(!rx.borrow().is_active());

        gate.try_activate("https://a.example/");

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().url(), Some("https://a.example/"));
    }
}
