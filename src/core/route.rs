//! Route tables and internet-route classification.
//!
//! A [`RouteClassifier`] answers one question for a set of routes: would
//! traffic to the configured probe address be forwarded by any of them?
//! Per-route matching goes through the [`RouteMatcher`] seam so a platform
//! matcher can be plugged in; its faults never escape the classifier.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// A single route as reported by a link-properties change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub destination: IpNetwork,
    #[serde(default)]
    pub gateway: Option<IpAddr>,
    #[serde(default)]
    pub interface: Option<String>,
}

impl Route {
    pub fn new(destination: IpNetwork) -> Self {
        Self {
            destination,
            gateway: None,
            interface: None,
        }
    }

    pub fn via(mut self, gateway: IpAddr) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn dev(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// True for `0.0.0.0/0` and `::/0`.
    pub fn is_default(&self) -> bool {
        self.destination.prefix() == 0
    }
}

impl FromStr for Route {
    type Err = MonitorError;

    /// Parses `a.b.c.d/n`, `x::/n`, or a bare address as a host route.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let destination = if s.contains('/') {
            s.parse::<IpNetwork>()?
        } else {
            let addr = s
                .parse::<IpAddr>()
                .map_err(|e| MonitorError::InvalidRoute(format!("{s}: {e}")))?;
            IpNetwork::from(addr)
        };
        Ok(Route::new(destination))
    }
}

/// Link properties delivered with an interface-available event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkProperties {
    #[serde(default)]
    pub interface_name: Option<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl LinkProperties {
    pub fn new(interface_name: impl Into<String>, routes: Vec<Route>) -> Self {
        Self {
            interface_name: Some(interface_name.into()),
            routes,
        }
    }
}

/// Decides whether a route covers an address.
///
/// Implementations may fail for routes they cannot interpret; the
/// classifier treats such a route as non-matching.
pub trait RouteMatcher: Send + Sync {
    fn matches(&self, route: &Route, addr: IpAddr) -> anyhow::Result<bool>;
}

/// Prefix containment. A route of the other address family never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixMatcher;

impl RouteMatcher for PrefixMatcher {
    fn matches(&self, route: &Route, addr: IpAddr) -> anyhow::Result<bool> {
        Ok(route.destination.contains(addr))
    }
}

/// Classifies a route set against a fixed probe address.
#[derive(Clone)]
pub struct RouteClassifier {
    probe: IpAddr,
    matcher: Arc<dyn RouteMatcher>,
}

impl RouteClassifier {
    pub fn new(probe: IpAddr) -> Self {
        Self::with_matcher(probe, Arc::new(PrefixMatcher))
    }

    pub fn with_matcher(probe: IpAddr, matcher: Arc<dyn RouteMatcher>) -> Self {
        Self { probe, matcher }
    }

    pub fn probe(&self) -> IpAddr {
        self.probe
    }

    /// True iff at least one route covers the probe address.
    pub fn has_internet_route(&self, routes: &[Route]) -> bool {
        routes.iter().any(|route| {
            self.matcher
                .matches(route, self.probe)
                .unwrap_or_else(|e| {
                    tracing::warn!(
                        "Route match failed for {} (probe {}): {e:#}",
                        route.destination,
                        self.probe
                    );
                    false
                })
        })
    }
}

impl std::fmt::Debug for RouteClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteClassifier")
            .field("probe", &self.probe)
            .finish_non_exhaustive()
    }
}
