//! Forward validation events to the visible surface only

use std::sync::{Arc, Weak};

use envoy_core::ValidationEvent;
use parking_lot::RwLock;
use tracing::debug;

use crate::{Surface, SurfaceKind};

/// Result of one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The visible surface's observer was called
    Delivered(SurfaceKind),
    /// The visible surface does not observe activation; dropped
    Unsupported(SurfaceKind),
    /// Nothing visible (never set, cleared, or already dropped)
    NoSurface,
}

/// Tracks the visible surface without owning it
///
/// Events are never queued: a page that becomes visible after a delivery
/// does not see it.
#[derive(Default)]
pub struct SurfaceDispatcher {
    visible: RwLock<Option<Weak<dyn Surface>>>,
}

impl SurfaceDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_visible(&self, surface: &Arc<dyn Surface>) {
        debug!("Visible surface is now {}", surface.kind());
        *self.visible.write() = Some(Arc::downgrade(surface));
    }

    pub fn clear_visible(&self) {
        *self.visible.write() = None;
    }

    /// Kind of the visible surface, if it is still alive
    pub fn visible_kind(&self) -> Option<SurfaceKind> {
        self.visible_surface().map(|s| s.kind())
    }

    fn visible_surface(&self) -> Option<Arc<dyn Surface>> {
        self.visible.read().as_ref().and_then(Weak::upgrade)
    }

    /// Hand `event` to the visible surface if it observes activation
    ///
    /// The observer runs after the lock is released.
    pub fn dispatch(&self, event: &ValidationEvent) -> DispatchOutcome {
        let Some(surface) = self.visible_surface() else {
            debug!("No visible surface, dropping validation event");
            return DispatchOutcome::NoSurface;
        };

        let kind = surface.kind();
        match surface.activation_observer() {
            Some(observer) => {
                debug!("Delivering validation event to {}", kind);
                observer.on_validation_event(event);
                DispatchOutcome::Delivered(kind)
            }
            None => {
                debug!("Visible surface {} does not observe activation, dropping event", kind);
                DispatchOutcome::Unsupported(kind)
            }
        }
    }
}
