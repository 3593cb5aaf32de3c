//! Per-source upstream trackers.
//!
//! A tracker is the callback object handed to a notification source. Each
//! event replaces the held [`UpstreamState`] and then tells the tracker's
//! [`ChangeListener`]; the listener never sees the state itself, it only
//! learns that something changed.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::interface::{InterfaceState, UpstreamState};
use crate::core::route::{LinkProperties, RouteClassifier};
use crate::core::text::StyledSpan;

/// Events a notification source delivers to a registered callback.
///
/// Only fallback sources emit `on_fallback`, so it defaults to a no-op.
pub trait UpstreamCallback: Send + Sync {
    fn on_available(&self, ifname: &str, link: &LinkProperties);

    fn on_lost(&self);

    fn on_fallback(&self) {}
}

/// Receives a notification after every tracker transition.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerKind {
    Primary,
    Fallback,
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerKind::Primary => f.write_str("primary"),
            TrackerKind::Fallback => f.write_str("fallback"),
        }
    }
}

/// Holds the latest state reported by one source.
pub struct UpstreamTracker {
    kind: TrackerKind,
    state: Mutex<UpstreamState>,
    classifier: Arc<RouteClassifier>,
    listener: Arc<dyn ChangeListener>,
}

impl UpstreamTracker {
    pub fn new(
        kind: TrackerKind,
        classifier: Arc<RouteClassifier>,
        listener: Arc<dyn ChangeListener>,
    ) -> Self {
        Self {
            kind,
            state: Mutex::new(UpstreamState::Absent),
            classifier,
            listener,
        }
    }

    pub fn kind(&self) -> TrackerKind {
        self.kind
    }

    pub fn state(&self) -> UpstreamState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn label(&self) -> StyledSpan {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .label()
    }

    fn replace(&self, next: UpstreamState) {
        tracing::debug!("{} upstream -> {next:?}", self.kind);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        self.listener.on_change();
    }
}

impl UpstreamCallback for UpstreamTracker {
    fn on_available(&self, ifname: &str, link: &LinkProperties) {
        let has_internet = self.classifier.has_internet_route(&link.routes);
        self.replace(UpstreamState::Present(InterfaceState::new(
            ifname,
            has_internet,
        )));
    }

    fn on_lost(&self) {
        self.replace(UpstreamState::Absent);
    }

    fn on_fallback(&self) {
        match self.kind {
            TrackerKind::Fallback => {
                self.replace(UpstreamState::Present(InterfaceState::fallback_default()))
            }
            TrackerKind::Primary => {
                tracing::debug!("Ignoring fallback activation on primary tracker");
            }
        }
    }
}

impl fmt::Debug for UpstreamTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamTracker")
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
