//! Real-time MAVLink telemetry receiver with pluggable analyzers.
//!
//! Linkwatch listens for the telemetry a vehicle forwards over UDP, checks
//! every datagram against the MAVLink v1 framing rules and the one trusted
//! peer, and fans valid frames out to a fixed set of handlers. The same loop
//! drives four periodic callback tiers (100 Hz, 10 Hz, 1 Hz, 0.1 Hz) so
//! handlers can do timed work even while the link is silent.
//!
//! # Features
//!
//! - **Single-task loop**: no locks, one global ordering of packets and ticks
//! - **Rate-limited diagnostics**: drop reports never flood the log, and say
//!   how many were suppressed
//! - **Catch-up scheduling**: a stalled loop replays missed ticks, one per
//!   tier per iteration
//! - **Bounded analyzers**: the bundled EKF tracker keeps a fixed-size rolling
//!   history of variance excursions
//!
//! ## Example (scripted replay)
//!
//! ```rust,no_run
//! use linkwatch::{Config, HandlerRegistry, Linkwatch, ReplaySource, VarianceWindowTracker};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> linkwatch::Result<()> {
//!     let config = Config::default();
//!     let mut registry = HandlerRegistry::from_config(&config.handlers);
//!     registry.install(Box::new(VarianceWindowTracker::default()), &config)?;
//!
//!     let source = ReplaySource::new();
//!     let mut transport = Linkwatch::replay(source, registry, &config);
//!     let stats = transport.run(&CancellationToken::new()).await;
//!
//!     println!("dispatched {} packets", stats.packets_dispatched);
//!     for report in transport.registry().reports()? {
//!         println!("{report}");
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Receive path
pub mod rate_limit;
pub mod source;
pub mod sources;
pub mod transport;
pub mod validation;

// Dispatch and scheduling
pub mod handler;
pub mod registry;
pub mod scheduler;

// Decoding and analysis
pub mod analyzers;
pub mod mavlink;

// Core exports
pub use config::Config;
pub use error::*;
pub use types::*;

// Main API exports
pub use analyzers::{Analyzer, VarianceWindowTracker};
pub use handler::Handler;
pub use rate_limit::RateLimiter;
pub use registry::HandlerRegistry;
pub use scheduler::Scheduler;
pub use source::DatagramSource;
pub use sources::{ReplaySource, UdpSource};
pub use transport::{Event, PacketTransport, ReloadFlag, TransportStats};
pub use validation::{DropReason, PacketValidator};

/// Unified entry point for building a transport.
///
/// # Examples
///
/// ## Live link
/// ```rust,no_run
/// use linkwatch::{Config, HandlerRegistry, Linkwatch};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> linkwatch::Result<()> {
///     let config = Config::default();
///     let registry = HandlerRegistry::from_config(&config.handlers);
///     let transport = Linkwatch::listen(registry, &config).await?;
///     // Run transport...
///     Ok(())
/// }
/// ```
pub struct Linkwatch;

impl Linkwatch {
    /// Bind the receive socket and build a transport around it.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Bind`] if the socket cannot be bound. There is no
    /// retry: without a receive path the link is useless.
    pub async fn listen(
        registry: HandlerRegistry,
        config: &Config,
    ) -> Result<PacketTransport<UdpSource>> {
        let source = UdpSource::bind(config.link.bind).await?;
        Ok(PacketTransport::new(source, registry, &config.link))
    }

    /// Build a transport that plays back a scripted source.
    pub fn replay(
        source: ReplaySource,
        registry: HandlerRegistry,
        config: &Config,
    ) -> PacketTransport<ReplaySource> {
        PacketTransport::new(source, registry, &config.link)
    }
}
