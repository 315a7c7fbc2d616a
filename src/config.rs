//! Typed configuration.
//!
//! Configuration is a YAML document with three sections. Every key has a
//! default, so an empty document (or no file at all) yields a working setup
//! that listens for the vehicle at its factory address.
//!
//! ```yaml
//! link:
//!   peer: 10.1.1.10
//!   peer_port: 14560
//!   bind: 0.0.0.0:14550
//!   recv_timeout_ms: 200
//!   error_interval_ms: 1000
//! handlers:
//!   capacity: 10
//!   isolate_faults: false
//! ekf:
//!   velocity: { warn: 0.5, fail: 1.0 }
//!   compass: { warn: 0.6, fail: 1.2 }
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::{LinkError, Result};

/// Factory address of the vehicle's telemetry forwarder.
pub const DEFAULT_PEER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 1, 1, 10));

/// Port the vehicle forwards telemetry from and listens on for uplink.
pub const DEFAULT_PEER_PORT: u16 = 14560;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Transport settings
    pub link: LinkConfig,
    /// Handler registry settings
    pub handlers: HandlerConfig,
    /// EKF variance thresholds
    pub ekf: EkfConfig,
}

/// Transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Only datagrams from this IP are accepted
    pub peer: IpAddr,
    /// Vehicle's telemetry port; not used for matching, since the vehicle may
    /// send from any source port
    pub peer_port: u16,
    /// Local address for the receive socket
    pub bind: SocketAddr,
    /// Upper bound on a single wait for a datagram
    pub recv_timeout_ms: u64,
    /// Minimum spacing between rate-limited diagnostics
    pub error_interval_ms: u64,
    /// Receive buffer size; larger datagrams are truncated and then rejected
    pub max_datagram: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            peer: DEFAULT_PEER,
            peer_port: DEFAULT_PEER_PORT,
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            recv_timeout_ms: 200,
            error_interval_ms: 1000,
            max_datagram: 512,
        }
    }
}

impl LinkConfig {
    /// Full address of the vehicle, for handlers that send upstream.
    pub fn peer_socket(&self) -> SocketAddr {
        SocketAddr::new(self.peer, self.peer_port)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn error_interval(&self) -> Duration {
        Duration::from_millis(self.error_interval_ms)
    }
}

/// Handler registry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandlerConfig {
    /// Fixed number of handler slots
    pub capacity: usize,
    /// Contain handler panics instead of letting them unwind through the loop
    pub isolate_faults: bool,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self { capacity: 10, isolate_faults: false }
    }
}

/// Warn/fail pair for one variance metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    pub warn: f64,
    pub fail: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { warn: 0.5, fail: 1.0 }
    }
}

impl Thresholds {
    /// Check the pair is usable: finite, non-negative, warn at or below fail.
    pub fn check(&self) -> std::result::Result<(), String> {
        if !self.warn.is_finite() || !self.fail.is_finite() {
            return Err(format!("thresholds must be finite ({}, {})", self.warn, self.fail));
        }
        if self.warn < 0.0 || self.fail < 0.0 {
            return Err(format!("thresholds must be non-negative ({}, {})", self.warn, self.fail));
        }
        if self.warn > self.fail {
            return Err(format!("warn {} exceeds fail {}", self.warn, self.fail));
        }
        Ok(())
    }
}

/// Per-metric EKF variance thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EkfConfig {
    pub velocity: Thresholds,
    pub pos_horiz: Thresholds,
    pub pos_vert: Thresholds,
    pub compass: Thresholds,
    pub terrain_alt: Thresholds,
}

impl EkfConfig {
    /// Thresholds keyed by config name, in metric order.
    pub fn entries(&self) -> [(&'static str, Thresholds); 5] {
        [
            ("velocity", self.velocity),
            ("pos_horiz", self.pos_horiz),
            ("pos_vert", self.pos_vert),
            ("compass", self.compass),
            ("terrain_alt", self.terrain_alt),
        ]
    }
}

impl Config {
    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml =
            std::fs::read_to_string(path).map_err(|err| LinkError::config_file(path, err))?;
        debug!("Loaded configuration from {} ({} bytes)", path.display(), yaml.len());
        Self::from_yaml(&yaml)
    }

    /// Reject values the link cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.link.recv_timeout_ms == 0 {
            return Err(LinkError::invalid_config("link.recv_timeout_ms", "must be non-zero"));
        }
        if self.link.max_datagram < crate::types::FRAME_OVERHEAD {
            return Err(LinkError::invalid_config(
                "link.max_datagram",
                format!("must hold at least {} bytes", crate::types::FRAME_OVERHEAD),
            ));
        }
        if self.handlers.capacity == 0 {
            return Err(LinkError::invalid_config("handlers.capacity", "must be non-zero"));
        }
        for (name, thresholds) in self.ekf.entries() {
            thresholds
                .check()
                .map_err(|reason| LinkError::invalid_config(format!("ekf.{name}"), reason))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.link.peer, DEFAULT_PEER);
        assert_eq!(config.link.peer_socket(), "10.1.1.10:14560".parse::<SocketAddr>().unwrap());
        assert_eq!(config.link.recv_timeout(), Duration::from_millis(200));
        assert_eq!(config.handlers.capacity, 10);
        assert_eq!(config.ekf.velocity, Thresholds { warn: 0.5, fail: 1.0 });
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let yaml = r#"
link:
  peer: 192.168.1.7
  bind: 127.0.0.1:14550
ekf:
  compass: { warn: 0.6, fail: 1.2 }
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.link.peer, "192.168.1.7".parse::<IpAddr>().unwrap());
        assert_eq!(config.link.bind.port(), 14550);
        assert_eq!(config.link.peer_port, DEFAULT_PEER_PORT);
        assert_eq!(config.link.error_interval_ms, 1000);
        assert_eq!(config.ekf.compass, Thresholds { warn: 0.6, fail: 1.2 });
        assert_eq!(config.ekf.velocity, Thresholds::default());
    }

    #[test]
    fn peer_port_is_configurable() {
        let config = Config::from_yaml("link:\n  peer: 10.0.0.2\n  peer_port: 14600\n").unwrap();
        assert_eq!(config.link.peer_socket(), "10.0.0.2:14600".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_yaml("link:\n  pear: 10.0.0.1\n").unwrap_err();
        assert!(matches!(err, LinkError::ConfigParse { .. }));
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let err = Config::from_yaml("ekf:\n  pos_vert: { warn: 2.0, fail: 1.0 }\n").unwrap_err();
        match err {
            LinkError::InvalidConfig { key, .. } => assert_eq!(key, "ekf.pos_vert"),
            other => panic!("Expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = Config::from_yaml("handlers:\n  capacity: 0\n").unwrap_err();
        assert!(matches!(err, LinkError::InvalidConfig { .. }));
    }

    #[test]
    fn negative_thresholds_fail_check() {
        assert!(Thresholds { warn: -0.1, fail: 1.0 }.check().is_err());
        assert!(Thresholds { warn: 0.5, fail: f64::NAN }.check().is_err());
        assert!(Thresholds { warn: 1.0, fail: 1.0 }.check().is_ok());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load("/nonexistent/linkwatch.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/linkwatch.yaml"));
    }
}
