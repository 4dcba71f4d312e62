//! Demo transport pages
//!
//! Only the engine page listens for validation events; the rest exist so the
//! dispatcher has something else to be visible.

use std::sync::Arc;

use envoy_activation::{ActivationObserver, Surface, SurfaceKind};
use envoy_core::{ValidationEvent, ValidationPayload};
use parking_lot::Mutex;

/// Engine page: shows the latest validated egress
#[derive(Default)]
pub struct EnginePage {
    last: Mutex<Option<String>>,
}

impl EnginePage {
    pub fn last_url(&self) -> Option<String> {
        self.last.lock().clone()
    }
}

impl ActivationObserver for EnginePage {
    fn on_validation_event(&self, event: &ValidationEvent) {
        match event.payload() {
            ValidationPayload::Winner(url) => {
                println!("[{}] validated egress: {}", SurfaceKind::Engine.title(), url);
                *self.last.lock() = Some(url);
            }
            ValidationPayload::Empty => {
                println!("[{}] waiting for a validated egress", SurfaceKind::Engine.title());
            }
            ValidationPayload::Malformed(reason) => {
                println!("[{}] ignored malformed result: {}", SurfaceKind::Engine.title(), reason);
            }
        }
    }
}

impl Surface for EnginePage {
    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Engine
    }

    fn activation_observer(&self) -> Option<&dyn ActivationObserver> {
        Some(self)
    }
}

/// Any other page
pub struct StaticPage(SurfaceKind);

impl Surface for StaticPage {
    fn kind(&self) -> SurfaceKind {
        self.0
    }
}

pub fn page(kind: SurfaceKind) -> Arc<dyn Surface> {
    match kind {
        SurfaceKind::Engine => Arc::new(EnginePage::default()),
        other => Arc::new(StaticPage(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_engine_page_observes() {
        for kind in SurfaceKind::ALL {
            let surface = page(kind);
            assert_eq!(surface.kind(), kind);
            assert_eq!(surface.activation_observer().is_some(), kind == SurfaceKind::Engine);
        }
    }

    #[test]
    fn test_engine_page_keeps_last_winner() {
        let page = EnginePage::default();
        page.on_validation_event(&ValidationEvent::winner("socks5://127.0.0.1:1080"));
        page.on_validation_event(&ValidationEvent::empty());
        assert_eq!(page.last_url().as_deref(), Some("socks5://127.0.0.1:1080"));
    }
}
