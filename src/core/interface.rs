//! Observed upstream interface state.

use serde::Serialize;

use crate::config::{ABSENT_LABEL, FALLBACK_INTERFACE_NAME};
use crate::core::text::StyledSpan;

/// An interface reported up by a source. Replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceState {
    name: String,
    has_internet: bool,
}

impl InterfaceState {
    pub fn new(name: impl Into<String>, has_internet: bool) -> Self {
        Self {
            name: name.into(),
            has_internet,
        }
    }

    /// The placeholder reported when the fallback source activates its default upstream.
    pub fn fallback_default() -> Self {
        Self::new(FALLBACK_INTERFACE_NAME, true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_internet(&self) -> bool {
        self.has_internet
    }
}

/// What a tracker currently knows about its source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "interface", rename_all = "snake_case")]
pub enum UpstreamState {
    #[default]
    Absent,
    Present(InterfaceState),
}

impl UpstreamState {
    pub fn interface(&self) -> Option<&InterfaceState> {
        match self {
            UpstreamState::Absent => None,
            UpstreamState::Present(iface) => Some(iface),
        }
    }

    /// Bold name when the interface has an internet route, plain name
    /// otherwise, and the empty-set glyph when nothing is up.
    pub fn label(&self) -> StyledSpan {
        match self {
            UpstreamState::Absent => StyledSpan::plain(ABSENT_LABEL),
            UpstreamState::Present(iface) if iface.has_internet => StyledSpan::bold(&iface.name),
            UpstreamState::Present(iface) => StyledSpan::plain(&iface.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_default() {
        assert_eq!(UpstreamState::default(), UpstreamState::Absent);
        assert!(UpstreamState::Absent.interface().is_none());
    }

    #[test]
    fn test_absent_label_is_plain_glyph() {
        let label = UpstreamState::Absent.label();
        assert_eq!(label.text(), "∅");
        assert!(!label.is_bold());
    }

    #[test]
    fn test_emphasis_does_not_change_name() {
        let online = UpstreamState::Present(InterfaceState::new("wlan0", true)).label();
        let offline = UpstreamState::Present(InterfaceState::new("wlan0", false)).label();
        assert_eq!(online.text(), offline.text());
        assert!(online.is_bold());
        assert!(!offline.is_bold());
    }

    #[test]
    fn test_fallback_default_has_internet() {
        let iface = InterfaceState::fallback_default();
        assert_eq!(iface.name(), "<default>");
        assert!(iface.has_internet());
    }

    #[test]
    fn test_state_serializes_tagged() {
        let json =
            serde_json::to_value(UpstreamState::Present(InterfaceState::new("rndis0", false)))
                .unwrap();
        assert_eq!(json["state"], "present");
        assert_eq!(json["interface"]["name"], "rndis0");
        assert_eq!(json["interface"]["has_internet"], false);

        let json = serde_json::to_value(UpstreamState::Absent).unwrap();
        assert_eq!(json["state"], "absent");
    }
}
