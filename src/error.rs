//! Unified error type for the upstream monitor.
//!
//! `MonitorError` is returned by configuration loading, template parsing,
//! route parsing and source registration. It serializes as
//! `{ "kind": "...", "message": "..." }` so an embedding UI can tell the
//! categories apart without matching on message text.

use serde::ser::SerializeStruct;

/// Error returned by the upstream monitor.
///
/// Route-match faults raised by a [`RouteMatcher`](crate::core::RouteMatcher)
/// are not represented here: they are absorbed by the classifier.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// A route destination could not be parsed.
    #[error("invalid route: {0}")]
    InvalidRoute(String),

    /// The summary template is malformed or does not have both slots.
    #[error("invalid summary template: {0}")]
    Template(String),

    /// A callback was registered twice with the same source.
    #[error("callback already registered with {0} source")]
    AlreadyRegistered(String),

    /// A callback was unregistered from a source it was never registered with.
    #[error("callback not registered with {0} source")]
    NotRegistered(String),

    /// The lifecycle owner has been destroyed.
    #[error("lifecycle owner destroyed")]
    Destroyed,

    /// No tokio runtime was available to host the update task.
    #[error("no async runtime: {0}")]
    Runtime(String),

    /// Invalid configuration input.
    #[error("{0}")]
    Config(String),
}

impl MonitorError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorError::InvalidRoute(_) => "InvalidRoute",
            MonitorError::Template(_) => "Template",
            MonitorError::AlreadyRegistered(_) => "AlreadyRegistered",
            MonitorError::NotRegistered(_) => "NotRegistered",
            MonitorError::Destroyed => "Destroyed",
            MonitorError::Runtime(_) => "Runtime",
            MonitorError::Config(_) => "Config",
        }
    }
}

impl serde::Serialize for MonitorError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("MonitorError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

// ---- From implementations for ergonomic error conversion ----

impl From<tokio::runtime::TryCurrentError> for MonitorError {
    fn from(err: tokio::runtime::TryCurrentError) -> Self {
        MonitorError::Runtime(err.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Config(err.to_string())
    }
}

impl From<ipnetwork::IpNetworkError> for MonitorError {
    fn from(err: ipnetwork::IpNetworkError) -> Self {
        MonitorError::InvalidRoute(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_returns_correct_variant_name() {
        assert_eq!(MonitorError::InvalidRoute("x".into()).kind(), "InvalidRoute");
        assert_eq!(MonitorError::Template("x".into()).kind(), "Template");
        assert_eq!(
            MonitorError::AlreadyRegistered("primary".into()).kind(),
            "AlreadyRegistered"
        );
        assert_eq!(
            MonitorError::NotRegistered("primary".into()).kind(),
            "NotRegistered"
        );
        assert_eq!(MonitorError::Destroyed.kind(), "Destroyed");
        assert_eq!(MonitorError::Runtime("x".into()).kind(), "Runtime");
        assert_eq!(MonitorError::Config("x".into()).kind(), "Config");
    }

    #[test]
    fn test_registration_errors_name_the_source() {
        let err = MonitorError::AlreadyRegistered("fallback".into());
        assert_eq!(err.to_string(), "callback already registered with fallback source");
    }

    #[test]
    fn test_error_serializes_as_kind_and_message() {
        let err = MonitorError::Template("missing slot %2$s".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "Template");
        assert_eq!(json["message"], "invalid summary template: missing slot %2$s");
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_from_serde_json_produces_config_variant() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: MonitorError = json_err.into();
        assert_eq!(err.kind(), "Config");
    }

    #[test]
    fn test_from_ipnetwork_error_produces_invalid_route_variant() {
        let net_err = "10.0.0.0/99".parse::<ipnetwork::IpNetwork>().unwrap_err();
        let err: MonitorError = net_err.into();
        assert_eq!(err.kind(), "InvalidRoute");
    }
}
