//! Activation orchestrator

use std::sync::Arc;

use envoy_core::{ActivationState, CandidateSet};
use envoy_engine::EngineProvider;
use envoy_validation::{ServiceConnector, ValidationProber};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    ActivationContext, ActivationError, Canary, EngineActivationSequencer, OrchestratorConfig, Result,
    ResultListener, ServiceBinder, ServiceConnectionState, Subscription, Surface, SurfaceDispatcher,
    SurfaceKind,
};

/// Owns one activation lifetime
///
/// The listener subscription lives until `shutdown` or drop. A late winner
/// still activates after `wait_for_activation` has timed out.
pub struct Orchestrator {
    config: OrchestratorConfig,
    context: Arc<ActivationContext>,
    prober: Arc<dyn ValidationProber>,
    dispatcher: Arc<SurfaceDispatcher>,
    binder: ServiceBinder,
    listener: Arc<ResultListener>,
    subscription: Mutex<Option<Subscription>>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        prober: Arc<dyn ValidationProber>,
        connector: Arc<dyn ServiceConnector>,
        engine: Arc<dyn EngineProvider>,
        canary: Arc<dyn Canary>,
    ) -> Self {
        let context = Arc::new(ActivationContext::new(engine));
        let dispatcher = Arc::new(SurfaceDispatcher::new());
        let sequencer = Arc::new(EngineActivationSequencer::new(
            context.clone(),
            canary,
            config.user_agent.clone(),
        ));
        let listener = Arc::new(ResultListener::new(context.clone(), dispatcher.clone(), sequencer));

        Self {
            config,
            context,
            prober,
            dispatcher,
            binder: ServiceBinder::new(connector),
            listener,
            subscription: Mutex::new(None),
            watchdog: Mutex::new(None),
            shutdown_tx: watch::channel(false).0,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<ActivationContext> {
        &self.context
    }

    pub fn state(&self) -> ActivationState {
        self.context.state()
    }

    /// Subscribe (once) and submit `candidates`; returns immediately
    ///
    /// Must run inside a tokio runtime.
    pub fn start(&self, candidates: CandidateSet) -> Result<()> {
        if self.is_shut_down() {
            return Err(ActivationError::ShutDown);
        }

        {
            let mut subscription = self.subscription.lock();
            if subscription.is_none() {
                debug!("Subscribing to validation results");
                *subscription = Some(self.listener.clone().spawn(self.prober.subscribe()));
            }
        }

        info!("Submitting {} candidate(s): {:?}", candidates.len(), candidates.urls());
        self.prober.submit(candidates);
        self.arm_watchdog();
        Ok(())
    }

    /// Submit the candidates named by the config
    pub fn start_from_config(&self) -> Result<()> {
        self.start(self.config.candidates())
    }

    /// Log once if the round outlives `validation_timeout`
    fn arm_watchdog(&self) {
        let Some(timeout) = self.config.validation_timeout() else {
            return;
        };
        let mut state = self.context.gate().subscribe();
        let handle = tokio::spawn(async move {
            if tokio::time::timeout(timeout, state.wait_for(ActivationState::is_active))
                .await
                .is_err()
            {
                warn!("No valid egress reported within {:?}; still listening", timeout);
            }
        });
        if let Some(previous) = self.watchdog.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Wait for the gate to open, bounded by `validation_timeout`
    ///
    /// Returns `ShutDown` if the orchestrator is, or becomes, shut down first.
    pub async fn wait_for_activation(&self) -> Result<String> {
        let mut state = self.context.gate().subscribe();
        let mut shut_down = self.shutdown_tx.subscribe();
        if *shut_down.borrow_and_update() {
            return Err(ActivationError::ShutDown);
        }

        let wait = async {
            tokio::select! {
                active = state.wait_for(ActivationState::is_active) => active
                    .map(|s| s.url().unwrap_or_default().to_string())
                    .map_err(|_| ActivationError::ShutDown),
                _ = shut_down.wait_for(|closed| *closed) => Err(ActivationError::ShutDown),
            }
        };

        match self.config.validation_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, wait)
                .await
                .map_err(|_| ActivationError::Timeout(timeout))?,
            None => wait.await,
        }
    }

    /// Orchestrator became visible
    pub fn on_visible(&self) -> Result<()> {
        self.binder.on_visible()
    }

    /// Orchestrator stopped being visible
    pub fn on_hidden(&self) {
        self.binder.on_hidden();
    }

    /// Prober connection dropped without an unbind; call `on_visible` to
    /// bind again
    pub fn on_service_disconnected(&self) {
        self.binder.on_service_disconnected();
    }

    pub fn service_state(&self) -> ServiceConnectionState {
        self.binder.state()
    }

    /// Synchronous prober status; `NotBound` while hidden
    pub fn known_valid_urls(&self) -> Result<Vec<String>> {
        self.binder.known_valid_urls()
    }

    pub fn set_visible_surface(&self, surface: &Arc<dyn Surface>) {
        self.dispatcher.set_visible(surface);
    }

    pub fn clear_visible_surface(&self) {
        self.dispatcher.clear_visible();
    }

    pub fn visible_surface(&self) -> Option<SurfaceKind> {
        self.dispatcher.visible_kind()
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn is_listening(&self) -> bool {
        self.subscription.lock().as_ref().is_some_and(Subscription::is_active)
    }

    /// Tear down the listener and the prober connection; idempotent
    pub fn shutdown(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        if let Some(mut subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        if let Some(watchdog) = self.watchdog.lock().take() {
            watchdog.abort();
        }
        self.binder.on_hidden();
        info!("Orchestrator shut down ({:?})", self.state());
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
