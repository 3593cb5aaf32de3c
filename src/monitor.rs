//! Notification sources that trackers register with.
//!
//! [`UpstreamSource`] is the registration contract. [`UpstreamMonitor`] is an
//! in-process implementation: whatever observes the platform reports
//! availability, loss and fallback activation into it, and it fans those out
//! to registered callbacks. A newly registered callback is first brought up
//! to date with the current upstream, if there is one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::core::{LinkProperties, UpstreamCallback};
use crate::error::MonitorError;

/// Registration contract of a network-change notification source.
///
/// Callbacks may call back into the source they are registered with,
/// including unregistering themselves or each other.
pub trait UpstreamSource: Send + Sync {
    /// Fails with [`MonitorError::AlreadyRegistered`] for a callback that is
    /// already registered.
    fn register(&self, callback: Arc<dyn UpstreamCallback>) -> Result<(), MonitorError>;

    /// Fails with [`MonitorError::NotRegistered`] for an unknown callback.
    /// Once this returns, the callback receives no further events.
    fn unregister(&self, callback: &Arc<dyn UpstreamCallback>) -> Result<(), MonitorError>;
}

/// Last event a monitor reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SourceState {
    #[default]
    Unknown,
    Available {
        ifname: String,
        link: LinkProperties,
    },
    Lost,
    Fallback,
}

#[derive(Default)]
struct Registry {
    current: SourceState,
    callbacks: Vec<Arc<dyn UpstreamCallback>>,
}

/// In-process notification source with replay on registration.
pub struct UpstreamMonitor {
    name: String,
    registry: Mutex<Registry>,
    // Held for a whole delivery, and by (un)registration from other threads.
    delivery: Mutex<()>,
    delivering_on: Mutex<Option<ThreadId>>,
}

fn same_callback(a: &Arc<dyn UpstreamCallback>, b: &Arc<dyn UpstreamCallback>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Marks the current thread as delivering until dropped.
struct Delivering<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
    previous: Option<ThreadId>,
}

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = self.previous;
    }
}

impl UpstreamMonitor {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            registry: Mutex::new(Registry::default()),
            delivery: Mutex::new(()),
            delivering_on: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current(&self) -> SourceState {
        self.lock().current.clone()
    }

    pub fn callback_count(&self) -> usize {
        self.lock().callbacks.len()
    }

    pub fn report_available(&self, ifname: &str, link: LinkProperties) {
        tracing::debug!("{} source: {ifname} available", self.name);
        let delivered = link.clone();
        self.deliver(
            SourceState::Available {
                ifname: ifname.to_string(),
                link,
            },
            |callback| callback.on_available(ifname, &delivered),
        );
    }

    pub fn report_lost(&self) {
        tracing::debug!("{} source: upstream lost", self.name);
        self.deliver(SourceState::Lost, |callback| callback.on_lost());
    }

    pub fn report_fallback(&self) {
        tracing::debug!("{} source: fallback activated", self.name);
        self.deliver(SourceState::Fallback, |callback| callback.on_fallback());
    }

    /// Record `next` and hand it to every callback registered at the time
    /// of the call and still registered when its turn comes.
    fn deliver(&self, next: SourceState, event: impl Fn(&dyn UpstreamCallback)) {
        let _exclusive = self.exclusive();
        let snapshot = {
            let mut registry = self.lock();
            registry.current = next;
            registry.callbacks.clone()
        };
        let _delivering = self.delivering();
        for callback in &snapshot {
            if self.is_registered(callback) {
                event(callback.as_ref());
            }
        }
    }

    /// Serialize against deliveries on other threads. A thread that is
    /// already delivering holds the lock further up its own stack.
    fn exclusive(&self) -> Option<MutexGuard<'_, ()>> {
        let here = Some(thread::current().id());
        if *self.delivering_on.lock().unwrap_or_else(PoisonError::into_inner) == here {
            return None;
        }
        Some(self.delivery.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn delivering(&self) -> Delivering<'_> {
        let mut slot = self.delivering_on.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = slot.replace(thread::current().id());
        Delivering {
            slot: &self.delivering_on,
            previous,
        }
    }

    fn is_registered(&self, callback: &Arc<dyn UpstreamCallback>) -> bool {
        self.lock().callbacks.iter().any(|c| same_callback(c, callback))
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UpstreamSource for UpstreamMonitor {
    fn register(&self, callback: Arc<dyn UpstreamCallback>) -> Result<(), MonitorError> {
        let _exclusive = self.exclusive();
        let current = {
            let mut registry = self.lock();
            if registry.callbacks.iter().any(|c| same_callback(c, &callback)) {
                return Err(MonitorError::AlreadyRegistered(self.name.clone()));
            }
            registry.callbacks.push(Arc::clone(&callback));
            tracing::debug!(
                "{} source: callback registered ({} total)",
                self.name,
                registry.callbacks.len()
            );
            registry.current.clone()
        };
        let _delivering = self.delivering();
        match current {
            SourceState::Available { ifname, link } => callback.on_available(&ifname, &link),
            SourceState::Fallback => callback.on_fallback(),
            SourceState::Unknown | SourceState::Lost => {}
        }
        Ok(())
    }

    fn unregister(&self, callback: &Arc<dyn UpstreamCallback>) -> Result<(), MonitorError> {
        let _exclusive = self.exclusive();
        let mut registry = self.lock();
        let position = registry
            .callbacks
            .iter()
            .position(|c| same_callback(c, callback))
            .ok_or_else(|| MonitorError::NotRegistered(self.name.clone()))?;
        registry.callbacks.remove(position);
        tracing::debug!(
            "{} source: callback unregistered ({} left)",
            self.name,
            registry.callbacks.len()
        );
        Ok(())
    }
}
