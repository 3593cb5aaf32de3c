//! Upstream interface summary for a tethering service.
//!
//! Two notification sources report the primary and the fallback upstream.
//! An [`UpstreamsBinding`] registers one tracker with each while its
//! [`LifecycleOwner`] is started, and publishes a combined summary such as
//! "**wlan0** (fallback: ∅)" to a [`SummarySink`] whenever either changes.
//! Bold marks an interface with a route to the probe address.

mod binding;
pub mod config;
pub mod core;
mod error;
pub mod lifecycle;
pub mod monitor;

pub use binding::UpstreamsBinding;
pub use config::MonitorConfig;
pub use crate::core::{StyledText, SummarySink, TracingSink};
pub use error::MonitorError;
pub use lifecycle::{LifecycleObserver, LifecycleOwner, LifecycleState};
pub use monitor::{UpstreamMonitor, UpstreamSource};

/// Install the global tracing subscriber and a panic hook that logs panics.
///
/// The filter comes from `RUST_LOG`, defaulting to
/// [`config::DEFAULT_LOG_FILTER`]. Returns `false` when a subscriber was
/// already installed, in which case nothing changes.
pub fn init_logging() -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config::DEFAULT_LOG_FILTER.into()),
        )
        .try_init()
        .is_ok();

    if installed {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!("PANIC in upstreams: {info}");
            default_hook(info);
        }));
    }
    installed
}
