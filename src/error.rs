//! Error types for the telemetry link.
//!
//! Errors raised while bringing the link up (socket bind, configuration,
//! handler registration) are fatal: without a working receive path or a
//! complete handler set the process has no purpose. Malformed datagrams are
//! not errors at all; they are dropped by the validator and reported through
//! the rate limiter as a [`DropReason`](crate::DropReason).
//!
//! ## Error Categories
//!
//! - **Transport Errors**: socket bind or signal registration failures
//! - **Configuration Errors**: unreadable, unparsable or inconsistent config
//! - **Registry Errors**: handler capacity exhausted at startup
//! - **Serialization Errors**: analyzer results could not be rendered
//!
//! ```rust
//! use linkwatch::LinkError;
//!
//! let error = LinkError::capacity_exceeded(10, "Good EKF");
//! assert!(error.is_fatal());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for link operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Main error type for link operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Failed to bind telemetry socket on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file error: {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parse error: {details}")]
    ConfigParse { details: String },

    #[error("Invalid configuration for '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("Handler registry full: capacity {capacity} exhausted registering '{handler}'")]
    CapacityExceeded { capacity: usize, handler: String },

    #[error("Failed to install {signal} handler")]
    Signal {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize results for '{analyzer}'")]
    Serialization {
        analyzer: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LinkError {
    /// Returns whether this error must abort startup.
    ///
    /// Only serialization failures are survivable; they affect one report,
    /// not the receive path.
    pub fn is_fatal(&self) -> bool {
        match self {
            LinkError::Bind { .. } => true,
            LinkError::ConfigFile { .. } => true,
            LinkError::ConfigParse { .. } => true,
            LinkError::InvalidConfig { .. } => true,
            LinkError::CapacityExceeded { .. } => true,
            LinkError::Signal { .. } => true,
            LinkError::Serialization { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LinkError::Bind { .. } => vec![
                "Check that the bind address exists on this host",
                "Ensure no other process holds the UDP port",
                "Use port 0 to let the kernel pick a free port",
            ],
            LinkError::ConfigFile { .. } => vec![
                "Check the configuration file exists and is readable",
                "Run without a path to use built-in defaults",
            ],
            LinkError::ConfigParse { .. } => vec![
                "Validate the YAML syntax",
                "Remove keys that are not part of the configuration schema",
            ],
            LinkError::InvalidConfig { .. } => vec![
                "Keep thresholds finite and non-negative",
                "Keep each warn threshold at or below its fail threshold",
                "Use non-zero timeouts and capacities",
            ],
            LinkError::CapacityExceeded { .. } => vec![
                "Raise handlers.capacity in the configuration",
                "Register fewer handlers",
            ],
            LinkError::Signal { .. } => vec![
                "Check the process is allowed to install signal handlers",
                "Run inside a tokio runtime with signal support enabled",
            ],
            LinkError::Serialization { .. } => vec![
                "Check analyzer results for values JSON cannot represent",
            ],
        }
    }

    /// Helper constructor for socket bind failures.
    pub fn bind_failed(addr: SocketAddr, source: std::io::Error) -> Self {
        LinkError::Bind { addr, source }
    }

    /// Helper constructor for configuration file errors with path context.
    pub fn config_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LinkError::ConfigFile { path: path.into(), source }
    }

    /// Helper constructor for configuration parse errors.
    pub fn config_parse(details: impl Into<String>) -> Self {
        LinkError::ConfigParse { details: details.into() }
    }

    /// Helper constructor for semantically invalid configuration values.
    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        LinkError::InvalidConfig { key: key.into(), reason: reason.into() }
    }

    /// Helper constructor for registry overflow.
    pub fn capacity_exceeded(capacity: usize, handler: impl Into<String>) -> Self {
        LinkError::CapacityExceeded { capacity, handler: handler.into() }
    }

    /// Helper constructor for result serialization failures.
    pub fn serialization(analyzer: impl Into<String>, source: serde_json::Error) -> Self {
        LinkError::Serialization { analyzer: analyzer.into(), source }
    }
}

impl From<serde_yaml_ng::Error> for LinkError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        LinkError::ConfigParse { details: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_carry_their_context(
            key in "[a-z_.]+",
            reason in ".*",
            capacity in 0usize..64,
            handler in "\\w+",
        ) {
            let invalid = LinkError::invalid_config(key.clone(), reason.clone());
            let msg = invalid.to_string();
            prop_assert!(msg.contains(&key));
            prop_assert!(msg.contains(&reason));

            let full = LinkError::capacity_exceeded(capacity, handler.clone());
            let msg = full.to_string();
            prop_assert!(msg.contains(&capacity.to_string()));
            prop_assert!(msg.contains(&handler));
        }
    }

    #[test]
    fn startup_errors_are_fatal() {
        let addr: SocketAddr = "0.0.0.0:14550".parse().unwrap();
        let bind = LinkError::bind_failed(
            addr,
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        );
        assert!(bind.is_fatal());
        assert!(LinkError::capacity_exceeded(2, "heart").is_fatal());
        assert!(LinkError::config_parse("bad").is_fatal());

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!LinkError::serialization("Good EKF", json_err).is_fatal());
    }

    #[test]
    fn bind_error_preserves_source() {
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let err = LinkError::bind_failed(
            addr,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("127.0.0.1:9"));
        let source = std::error::Error::source(&err).expect("source should be kept");
        assert_eq!(source.to_string(), "denied");
    }

    #[test]
    fn every_error_has_suggestions() {
        let errors = vec![
            LinkError::config_file("/etc/linkwatch.yaml", std::io::Error::other("x")),
            LinkError::config_parse("x"),
            LinkError::invalid_config("ekf", "x"),
            LinkError::capacity_exceeded(1, "x"),
        ];
        for error in errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn yaml_errors_convert_to_parse_errors() {
        let err = serde_yaml_ng::from_str::<u32>("[not, a, number]").unwrap_err();
        let converted: LinkError = err.into();
        assert!(matches!(converted, LinkError::ConfigParse { .. }));
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<LinkError>();
    }
}
