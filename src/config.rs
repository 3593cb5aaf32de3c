//! Centralized constants and runtime configuration for the upstream monitor.
//!
//! Fixed literals live here as constants. Values an embedder may override are
//! collected in [`MonitorConfig`], which is built once at startup and passed
//! explicitly to whatever needs it.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::core::SummaryTemplate;
use crate::error::MonitorError;

/// Probe destination used to decide whether an interface has an internet route.
pub const DEFAULT_PROBE_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));

/// Label shown for a tracker with no interface up.
pub const ABSENT_LABEL: &str = "\u{2205}";

/// Interface name reported when the fallback source activates its default upstream.
pub const FALLBACK_INTERFACE_NAME: &str = "<default>";

/// Summary template with two ordered slots: primary, then fallback.
pub const DEFAULT_SUMMARY_TEMPLATE: &str = "%1$s (fallback: %2$s)";

/// Log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "upstreams=info";

/// Process-wide immutable settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Address a route must cover for its interface to count as having internet.
    pub probe_address: IpAddr,
    /// Two-slot template for the combined summary.
    pub summary_template: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_address: DEFAULT_PROBE_ADDRESS,
            summary_template: DEFAULT_SUMMARY_TEMPLATE.to_string(),
        }
    }
}

impl MonitorConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(input: &str) -> Result<Self, MonitorError> {
        let config: MonitorConfig = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the template is usable.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.probe_address.is_unspecified() {
            return Err(MonitorError::Config(format!(
                "probe address {} is unspecified",
                self.probe_address
            )));
        }
        SummaryTemplate::parse(&self.summary_template).map(|_| ())
    }

    pub fn template(&self) -> Result<SummaryTemplate, MonitorError> {
        SummaryTemplate::parse(&self.summary_template)
    }
}
