//! Test utilities shared by unit tests and benchmarks.
//!
//! Provides handlers that record what the registry and transport did to them,
//! a layer that records emitted log events, and helpers for building frames
//! from the trusted peer.

#![cfg(any(test, feature = "benchmark"))]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tracing::{Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::Tier;
use crate::handler::Handler;
use crate::mavlink::EkfStatusReport;

/// Address the default configuration trusts.
pub fn peer_addr() -> SocketAddr {
    SocketAddr::new(crate::config::DEFAULT_PEER, 14560)
}

/// Address that is not the trusted peer.
pub fn stranger_addr() -> SocketAddr {
    "192.0.2.1:14560".parse().expect("static address parses")
}

/// Encoded EKF status frame with every variance set to `value`.
pub fn uniform_ekf_frame(seq: u8, value: f32) -> Vec<u8> {
    EkfStatusReport {
        velocity_variance: value,
        pos_horiz_variance: value,
        pos_vert_variance: value,
        compass_variance: value,
        terrain_alt_variance: value,
        flags: 0,
    }
    .to_frame(seq)
}

/// A callback observed by a [`RecordingHandler`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Packet { handler: String, len: usize },
    Reload { handler: String },
    EndOfStream { handler: String, packet_count: u32, bytes_dropped: u64 },
    Tick { handler: String, tier: Tier },
}

/// Shared, ordered log of callbacks across handlers.
pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Handler that appends every callback to a shared log.
pub struct RecordingHandler {
    name: String,
    log: CallLog,
    accept_config: bool,
}

impl RecordingHandler {
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self { name: name.into(), log, accept_config: true }
    }

    /// Make [`Handler::configure`] return `false`.
    pub fn rejecting_config(mut self) -> Self {
        self.accept_config = false;
        self
    }

    fn record(&self, call: Call) {
        if let Ok(mut log) = self.log.lock() {
            log.push(call);
        }
    }

    fn tick(&self, tier: Tier) {
        self.record(Call::Tick { handler: self.name.clone(), tier });
    }
}

impl Handler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, _config: &crate::Config) -> bool {
        self.accept_config
    }

    fn handle_packet(&mut self, packet: &[u8]) {
        self.record(Call::Packet { handler: self.name.clone(), len: packet.len() });
    }

    fn on_reload(&mut self) {
        self.record(Call::Reload { handler: self.name.clone() });
    }

    fn end_of_stream(&mut self, packet_count: u32, bytes_dropped: u64) {
        self.record(Call::EndOfStream { handler: self.name.clone(), packet_count, bytes_dropped });
    }

    fn idle_100hz(&mut self, _now: Instant) {
        self.tick(Tier::Hz100);
    }

    fn idle_10hz(&mut self, _now: Instant) {
        self.tick(Tier::Hz10);
    }

    fn idle_1hz(&mut self, _now: Instant) {
        self.tick(Tier::Hz1);
    }

    fn idle_tenth_hz(&mut self, _now: Instant) {
        self.tick(Tier::TenthHz);
    }
}

/// Handler that panics on every packet.
pub struct PanickingHandler;

impl Handler for PanickingHandler {
    fn name(&self) -> &str {
        "panicking"
    }

    fn handle_packet(&mut self, _packet: &[u8]) {
        panic!("handler fault injected by test");
    }
}

/// Count recorded ticks of one tier for one handler.
pub fn ticks(log: &CallLog, handler: &str, tier: Tier) -> usize {
    log.lock()
        .map(|calls| {
            calls
                .iter()
                .filter(|call| {
                    matches!(call, Call::Tick { handler: h, tier: t } if h == handler && *t == tier)
                })
                .count()
        })
        .unwrap_or(0)
}

/// One log event seen by an [`EventCapture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
}

/// Layer that records the level and target of every event.
#[derive(Debug, Clone, Default)]
pub struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events from `target` (or its submodules) at `level` or more severe.
    pub fn at_least(&self, level: Level, target: &str) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .map(|events| {
                events
                    .iter()
                    .filter(|event| event.level <= level && event.target.starts_with(target))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl<S: Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if let Ok(mut events) = self.events.lock() {
            events.push(CapturedEvent {
                level: *metadata.level(),
                target: metadata.target().to_string(),
            });
        }
    }
}
