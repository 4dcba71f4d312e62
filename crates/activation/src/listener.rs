//! Validation result listener

use std::sync::Arc;

use envoy_core::{ValidationEvent, ValidationPayload};
use envoy_validation::ValidationReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{ActivationContext, EngineActivationSequencer, SequenceOutcome, SurfaceDispatcher};

/// What one delivery did to activation state
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// This delivery opened the gate; the sequencer runs in the handle
    Activated(JoinHandle<SequenceOutcome>),
    /// Gate was already open; no-op
    AlreadyActive,
    /// Empty or malformed payload; no-op
    Ignored,
}

/// Feeds each delivery to the dispatcher, then to the gate
pub struct ResultListener {
    context: Arc<ActivationContext>,
    dispatcher: Arc<SurfaceDispatcher>,
    sequencer: Arc<EngineActivationSequencer>,
}

impl ResultListener {
    pub fn new(
        context: Arc<ActivationContext>,
        dispatcher: Arc<SurfaceDispatcher>,
        sequencer: Arc<EngineActivationSequencer>,
    ) -> Self {
        Self {
            context,
            dispatcher,
            sequencer,
        }
    }

    /// Handle one delivery
    ///
    /// Only fast state checks run here; the sequencer is spawned. Must run
    /// inside a tokio runtime.
    pub fn handle(&self, event: &ValidationEvent) -> DeliveryOutcome {
        self.dispatcher.dispatch(event);

        let url = match event.payload() {
            ValidationPayload::Winner(url) => url,
            ValidationPayload::Empty => {
                debug!("Received empty url, waiting for a winner");
                return DeliveryOutcome::Ignored;
            }
            ValidationPayload::Malformed(reason) => {
                warn!("Received invalid url: {}", reason);
                return DeliveryOutcome::Ignored;
            }
        };

        info!("Received valid url: {}", url);
        if !self.context.gate().try_activate(&url) {
            return DeliveryOutcome::AlreadyActive;
        }

        let sequencer = self.sequencer.clone();
        DeliveryOutcome::Activated(tokio::spawn(async move { sequencer.activate(&url) }))
    }

    /// Consume `rx` on a background task until unsubscribed or the prober
    /// drops its sender
    pub fn spawn(self: Arc<Self>, mut rx: ValidationReceiver) -> Subscription {
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.handle(&event);
            }
            debug!("Validation event stream closed");
        });
        Subscription { task: Some(task) }
    }
}

/// Live listener subscription; aborted on `unsubscribe` or drop
#[derive(Debug)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop listening; idempotent
    pub fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Unsubscribing validation listener");
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
