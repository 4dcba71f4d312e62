//! Bind-on-visible / unbind-on-hidden connection to the prober

use std::sync::{Arc, Weak};

use envoy_validation::{ServiceConnector, StatusQuery};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{ActivationError, Result};

/// Connection state to the prober
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceConnectionState {
    Unbound,
    /// Bind requested, connection not yet delivered
    Binding,
    Bound,
}

struct BinderInner {
    state: ServiceConnectionState,
    /// Bumped on every bind and unbind; a connection callback carrying an
    /// older value belongs to a cancelled bind
    generation: u64,
    handle: Option<Arc<dyn StatusQuery>>,
}

/// Follows the orchestrator's visible window
pub struct ServiceBinder {
    connector: Arc<dyn ServiceConnector>,
    inner: Arc<Mutex<BinderInner>>,
}

impl ServiceBinder {
    pub fn new(connector: Arc<dyn ServiceConnector>) -> Self {
        Self {
            connector,
            inner: Arc::new(Mutex::new(BinderInner {
                state: ServiceConnectionState::Unbound,
                generation: 0,
                handle: None,
            })),
        }
    }

    pub fn state(&self) -> ServiceConnectionState {
        self.inner.lock().state
    }

    pub fn is_bound(&self) -> bool {
        self.state() == ServiceConnectionState::Bound
    }

    /// Request a bind; no-op unless currently unbound
    pub fn on_visible(&self) -> Result<()> {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.state != ServiceConnectionState::Unbound {
                debug!("Bind already requested ({:?})", inner.state);
                return Ok(());
            }
            inner.state = ServiceConnectionState::Binding;
            inner.generation += 1;
            inner.generation
        };

        // Connector may call back synchronously; the lock is not held here
        let weak = Arc::downgrade(&self.inner);
        let result = self
            .connector
            .bind(Box::new(move |handle| Self::on_service_connected(&weak, generation, handle)));

        if let Err(e) = result {
            let mut inner = self.inner.lock();
            if inner.generation == generation {
                inner.state = ServiceConnectionState::Unbound;
            }
            warn!("Failed to bind validation service: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    /// Release the connection; safe while a bind is in flight and when
    /// already unbound
    pub fn on_hidden(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state == ServiceConnectionState::Unbound {
                debug!("Validation service already unbound");
                return;
            }
            inner.state = ServiceConnectionState::Unbound;
            inner.generation += 1;
            inner.handle = None;
        }
        self.connector.unbind();
        info!("Validation service unbound");
    }

    /// Connection lost without an unbind
    ///
    /// Releases the dead bind so the next `on_visible` binds afresh. No-op
    /// unless bound.
    pub fn on_service_disconnected(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state != ServiceConnectionState::Bound {
                debug!("Disconnect while {:?}, ignoring", inner.state);
                return;
            }
            inner.state = ServiceConnectionState::Unbound;
            inner.generation += 1;
            inner.handle = None;
        }
        warn!("Validation service disconnected");
        self.connector.unbind();
    }

    fn on_service_connected(inner: &Weak<Mutex<BinderInner>>, generation: u64, handle: Arc<dyn StatusQuery>) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut inner = inner.lock();
        if inner.generation != generation || inner.state != ServiceConnectionState::Binding {
            debug!("Discarding stale validation service connection");
            return;
        }
        inner.state = ServiceConnectionState::Bound;
        inner.handle = Some(handle);
        info!("Validation service bound");
    }

    /// Snapshot of URLs the prober has validated; `NotBound` unless bound
    pub fn known_valid_urls(&self) -> Result<Vec<String>> {
        // Clone the handle out so the query runs unlocked
        let handle = self.inner.lock().handle.clone();
        match handle {
            Some(handle) => Ok(handle.known_valid_urls()),
            None => Err(ActivationError::NotBound),
        }
    }
}
