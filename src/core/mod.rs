//! Core logic: route classification, upstream tracking, summary composition.
//!
//! - [`RouteClassifier`] — does a route set reach the probe address
//! - [`UpstreamState`] / [`InterfaceState`] — what a source last reported
//! - [`UpstreamTracker`] — per-source callback holding that state
//! - [`StatusAggregator`] — primary + fallback summary with coalesced refresh
//! - [`SummaryTemplate`] / [`StyledText`] — two-slot formatting with emphasis

pub mod aggregator;
pub mod interface;
pub mod route;
pub mod text;
pub mod tracker;

pub use aggregator::{RefreshTrigger, StatusAggregator, SummarySink, TracingSink};
pub use interface::{InterfaceState, UpstreamState};
pub use route::{LinkProperties, PrefixMatcher, Route, RouteClassifier, RouteMatcher};
pub use text::{StyledSpan, StyledText, SummaryTemplate};
pub use tracker::{ChangeListener, TrackerKind, UpstreamCallback, UpstreamTracker};
