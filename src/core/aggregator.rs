//! Combined primary/fallback summary and its coalesced refresh.
//!
//! Every tracker transition calls [`RefreshTrigger::on_change`]. The trigger
//! keeps at most one refresh queued on the owner's [`StartedScope`]; further
//! changes before it runs are folded into it. The queued job clears the
//! pending flag before reading the trackers, so a change that lands during a
//! recompute queues a follow-up instead of being lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;

use crate::core::route::RouteClassifier;
use crate::core::text::{StyledText, SummaryTemplate};
use crate::core::tracker::{ChangeListener, TrackerKind, UpstreamTracker};
use crate::lifecycle::StartedScope;

/// Display end of the pipeline.
pub trait SummarySink: Send + Sync {
    fn publish(&self, summary: StyledText);
}

impl SummarySink for mpsc::UnboundedSender<StyledText> {
    fn publish(&self, summary: StyledText) {
        if self.send(summary).is_err() {
            tracing::debug!("Summary receiver dropped");
        }
    }
}

/// Logs each summary at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl SummarySink for TracingSink {
    fn publish(&self, summary: StyledText) {
        tracing::info!("Upstreams: {summary}");
    }
}

/// Owns the primary and fallback trackers and publishes their combined summary.
pub struct StatusAggregator {
    primary: Arc<UpstreamTracker>,
    fallback: Arc<UpstreamTracker>,
    template: SummaryTemplate,
    sink: Arc<dyn SummarySink>,
}

impl StatusAggregator {
    /// Build both trackers wired to a refresh trigger on `scope`.
    pub fn new(
        classifier: Arc<RouteClassifier>,
        template: SummaryTemplate,
        sink: Arc<dyn SummarySink>,
        scope: StartedScope,
    ) -> Arc<Self> {
        Arc::new_cyclic(|aggregator: &Weak<StatusAggregator>| {
            let trigger: Arc<dyn ChangeListener> =
                Arc::new(RefreshTrigger::new(scope, aggregator.clone()));
            Self {
                primary: Arc::new(UpstreamTracker::new(
                    TrackerKind::Primary,
                    Arc::clone(&classifier),
                    Arc::clone(&trigger),
                )),
                fallback: Arc::new(UpstreamTracker::new(
                    TrackerKind::Fallback,
                    classifier,
                    trigger,
                )),
                template,
                sink,
            }
        })
    }

    pub fn primary(&self) -> &Arc<UpstreamTracker> {
        &self.primary
    }

    pub fn fallback(&self) -> &Arc<UpstreamTracker> {
        &self.fallback
    }

    /// The template filled with the current primary and fallback labels.
    pub fn summary(&self) -> StyledText {
        self.template
            .format(&self.primary.label(), &self.fallback.label())
    }

    /// Recompute and hand the summary to the sink.
    pub fn publish(&self) {
        let summary = self.summary();
        tracing::debug!("Publishing summary: {summary}");
        self.sink.publish(summary);
    }
}

/// Coalescing bridge from tracker changes to the owner's update queue.
pub struct RefreshTrigger {
    scope: StartedScope,
    pending: Arc<AtomicBool>,
    target: Weak<StatusAggregator>,
}

/// Clears the pending flag when the queued refresh runs or is discarded.
struct PendingGuard(Arc<AtomicBool>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RefreshTrigger {
    pub fn new(scope: StartedScope, target: Weak<StatusAggregator>) -> Self {
        Self {
            scope,
            pending: Arc::new(AtomicBool::new(false)),
            target,
        }
    }
}

impl ChangeListener for RefreshTrigger {
    fn on_change(&self) {
        if self.pending.swap(true, Ordering::AcqRel) {
            tracing::trace!("Refresh already queued, coalescing");
            return;
        }
        let guard = PendingGuard(Arc::clone(&self.pending));
        let target = self.target.clone();
        let queued = self.scope.launch(Box::new(move || {
            drop(guard);
            match target.upgrade() {
                Some(aggregator) => aggregator.publish(),
                None => tracing::trace!("Aggregator gone, refresh dropped"),
            }
        }));
        if !queued {
            tracing::trace!("Owner not started, refresh dropped");
        }
    }
}
