//! Attaches the upstream trackers to their sources for the owner's started span.
//!
//! `UpstreamsBinding` is created against a [`LifecycleOwner`] and registers
//! itself as one of its observers. On start it registers the primary tracker
//! with the primary source and the fallback tracker with the fallback source;
//! on stop it unregisters both. Tracker state is kept across a stop, so the
//! last label stays visible after a restart until a source delivers again.

use std::sync::{Arc, Mutex, PoisonError};

use crate::config::MonitorConfig;
use crate::core::{
    RouteClassifier, StatusAggregator, StyledText, SummarySink, UpstreamCallback,
};
use crate::error::MonitorError;
use crate::lifecycle::{LifecycleObserver, LifecycleOwner};
use crate::monitor::UpstreamSource;

pub struct UpstreamsBinding {
    aggregator: Arc<StatusAggregator>,
    primary_source: Arc<dyn UpstreamSource>,
    fallback_source: Arc<dyn UpstreamSource>,
    // Guards register/unregister so they never interleave.
    registered: Mutex<bool>,
}

impl UpstreamsBinding {
    /// Build the aggregator and trackers and observe `owner`.
    ///
    /// If `owner` is already started the trackers are registered before this returns.
    pub fn attach(
        owner: &LifecycleOwner,
        config: &MonitorConfig,
        primary_source: Arc<dyn UpstreamSource>,
        fallback_source: Arc<dyn UpstreamSource>,
        sink: Arc<dyn SummarySink>,
    ) -> Result<Arc<Self>, MonitorError> {
        let template = config.template()?;
        let classifier = Arc::new(RouteClassifier::new(config.probe_address));
        let aggregator = StatusAggregator::new(classifier, template, sink, owner.scope());

        let binding = Arc::new(Self {
            aggregator,
            primary_source,
            fallback_source,
            registered: Mutex::new(false),
        });
        owner.add_observer(binding.clone())?;
        Ok(binding)
    }

    pub fn aggregator(&self) -> &Arc<StatusAggregator> {
        &self.aggregator
    }

    pub fn summary(&self) -> StyledText {
        self.aggregator.summary()
    }

    pub fn is_registered(&self) -> bool {
        *self.registered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn primary_callback(&self) -> Arc<dyn UpstreamCallback> {
        self.aggregator.primary().clone()
    }

    fn fallback_callback(&self) -> Arc<dyn UpstreamCallback> {
        self.aggregator.fallback().clone()
    }
}

impl LifecycleObserver for UpstreamsBinding {
    fn on_start(&self) -> Result<(), MonitorError> {
        let mut registered = self.registered.lock().unwrap_or_else(PoisonError::into_inner);
        let primary = self.primary_callback();
        self.primary_source.register(Arc::clone(&primary))?;
        if let Err(e) = self.fallback_source.register(self.fallback_callback()) {
            if let Err(rollback) = self.primary_source.unregister(&primary) {
                tracing::error!("Failed to roll back primary registration: {rollback}");
            }
            return Err(e);
        }
        *registered = true;
        tracing::info!("Upstream trackers registered");
        Ok(())
    }

    fn on_stop(&self) -> Result<(), MonitorError> {
        let mut registered = self.registered.lock().unwrap_or_else(PoisonError::into_inner);
        if !*registered {
            return Ok(());
        }
        // Both unregistrations are attempted; the first error wins.
        let primary = self.primary_source.unregister(&self.primary_callback());
        let fallback = self.fallback_source.unregister(&self.fallback_callback());
        *registered = false;
        tracing::info!("Upstream trackers unregistered");
        primary.and(fallback)
    }
}
