//! Bind/unbind boundary to a prober

use std::sync::Arc;

use tracing::debug;

use crate::{Result, StatusQuery, ValidationService};

/// Invoked once the prober connection is up
pub type ConnectedCallback = Box<dyn FnOnce(Arc<dyn StatusQuery>) + Send>;

/// Connects to a prober across its process boundary
///
/// `bind` only requests the connection; the handle arrives through
/// `on_connected`, possibly later and on another thread.
pub trait ServiceConnector: Send + Sync {
    fn bind(&self, on_connected: ConnectedCallback) -> Result<()>;

    fn unbind(&self);
}

/// Connector for a prober living in this process; connects immediately
pub struct LocalConnector {
    service: Arc<ValidationService>,
}

impl LocalConnector {
    pub fn new(service: Arc<ValidationService>) -> Self {
        Self { service }
    }
}

impl ServiceConnector for LocalConnector {
    fn bind(&self, on_connected: ConnectedCallback) -> Result<()> {
        debug!("Binding local validation service");
        on_connected(self.service.clone());
        Ok(())
    }

    fn unbind(&self) {
        debug!("Unbinding local validation service");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_local_connector_connects_synchronously() {
        let connector = LocalConnector::new(Arc::new(ValidationService::default()));
        let handle: Arc<Mutex<Option<Arc<dyn StatusQuery>>>> = Arc::new(Mutex::new(None));
        let slot = handle.clone();

        connector
            .bind(Box::new(move |query| {
                *slot.lock() = Some(query);
            }))
            .unwrap();

        let query = handle.lock().clone().expect("not connected");
        assert!(query.known_valid_urls().is_empty());
        connector.unbind();
    }
}
