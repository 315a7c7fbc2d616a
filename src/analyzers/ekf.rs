//! EKF variance window tracking.
//!
//! The autopilot's extended Kalman filter reports five normalised variances
//! in every `EKF_STATUS_REPORT`. A variance above its warn threshold opens a
//! *window*; the window stays open, tracking its peak, until the variance
//! drops back to or below the warn threshold. Closed windows go into one
//! rolling history shared by all five metrics.
//!
//! ```text
//!            v > warn                    v <= warn
//!  Closed ─────────────▶ Open{start, peak} ─────────────▶ Closed
//!                          │   ▲                 (record start..T, peak)
//!                          └───┘ peak = max(peak, v)
//! ```
//!
//! The analyzer fails if any recorded or still-open window peaked at or above
//! its metric's fail threshold.
//!
//! Packets received through [`Handler::handle_packet`] are stamped in
//! microseconds on a monotonic clock that starts when the tracker is built,
//! so a window's `stop` never precedes its `start`.

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::history::{HISTORY_CAPACITY, HistoryBuffer};
use super::{Analyzer, Status};
use crate::config::{EkfConfig, Thresholds};
use crate::handler::Handler;
use crate::mavlink::{DecodedMessage, EkfStatusReport, decode_frame};
use crate::{Config, LinkError, Result};

/// The five variances reported by the EKF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Velocity,
    PosHoriz,
    PosVert,
    Compass,
    TerrainAlt,
}

impl Metric {
    pub const ALL: [Metric; 5] =
        [Metric::Velocity, Metric::PosHoriz, Metric::PosVert, Metric::Compass, Metric::TerrainAlt];

    pub fn index(self) -> usize {
        match self {
            Metric::Velocity => 0,
            Metric::PosHoriz => 1,
            Metric::PosVert => 2,
            Metric::Compass => 3,
            Metric::TerrainAlt => 4,
        }
    }

    /// Name used in result documents.
    pub fn name(self) -> &'static str {
        match self {
            Metric::Velocity => "velocity_variance",
            Metric::PosHoriz => "pos_horiz_variance",
            Metric::PosVert => "pos_vert_variance",
            Metric::Compass => "compass_variance",
            Metric::TerrainAlt => "terrain_alt_variance",
        }
    }

    /// This metric's value in a decoded report.
    pub fn value(self, report: &EkfStatusReport) -> f64 {
        let value = match self {
            Metric::Velocity => report.velocity_variance,
            Metric::PosHoriz => report.pos_horiz_variance,
            Metric::PosVert => report.pos_vert_variance,
            Metric::Compass => report.compass_variance,
            Metric::TerrainAlt => report.terrain_alt_variance,
        };
        f64::from(value)
    }

    fn thresholds(self, config: &EkfConfig) -> Thresholds {
        match self {
            Metric::Velocity => config.velocity,
            Metric::PosHoriz => config.pos_horiz,
            Metric::PosVert => config.pos_vert,
            Metric::Compass => config.compass,
            Metric::TerrainAlt => config.terrain_alt,
        }
    }
}

/// A metric together with its thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarianceMetric {
    pub metric: Metric,
    pub threshold_warn: f64,
    pub threshold_fail: f64,
}

impl VarianceMetric {
    pub fn new(metric: Metric, thresholds: Thresholds) -> Self {
        Self { metric, threshold_warn: thresholds.warn, threshold_fail: thresholds.fail }
    }
}

/// Live state of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LiveWindow {
    #[default]
    Closed,
    Open { start: u64, peak: f64 },
}

/// A finished excursion above the warn threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClosedWindowRecord {
    #[serde(skip)]
    pub metric: Metric,
    pub start: u64,
    pub stop: u64,
    pub peak: f64,
}

/// Handler tracking out-of-bounds EKF variance episodes.
#[derive(Debug, Clone)]
pub struct VarianceWindowTracker {
    metrics: [VarianceMetric; 5],
    live: [LiveWindow; 5],
    history: HistoryBuffer<ClosedWindowRecord>,
    last_timestamp: Option<u64>,
    seen_ekf_packets: bool,
    epoch: Instant,
}

impl Default for VarianceWindowTracker {
    fn default() -> Self {
        Self::new(&EkfConfig::default())
    }
}

impl VarianceWindowTracker {
    pub fn new(config: &EkfConfig) -> Self {
        Self {
            metrics: Metric::ALL
                .map(|metric| VarianceMetric::new(metric, metric.thresholds(config))),
            live: [LiveWindow::Closed; 5],
            history: HistoryBuffer::new(HISTORY_CAPACITY),
            last_timestamp: None,
            seen_ekf_packets: false,
            epoch: Instant::now(),
        }
    }

    pub fn metric(&self, metric: Metric) -> &VarianceMetric {
        &self.metrics[metric.index()]
    }

    pub fn live_window(&self, metric: Metric) -> LiveWindow {
        self.live[metric.index()]
    }

    /// Closed windows across all metrics, oldest first.
    pub fn history(&self) -> &HistoryBuffer<ClosedWindowRecord> {
        &self.history
    }

    pub fn seen_ekf_packets(&self) -> bool {
        self.seen_ekf_packets
    }

    /// Feed one decoded report stamped with its arrival time in microseconds.
    pub fn handle_decoded(&mut self, timestamp: u64, report: &EkfStatusReport) {
        self.seen_ekf_packets = true;
        self.last_timestamp = Some(timestamp);
        for metric in Metric::ALL {
            self.handle_variance(timestamp, metric, metric.value(report));
        }
    }

    /// Advance one metric's state machine.
    pub fn handle_variance(&mut self, timestamp: u64, metric: Metric, value: f64) {
        let i = metric.index();
        let warn_at = self.metrics[i].threshold_warn;
        self.last_timestamp = Some(timestamp);

        match self.live[i] {
            LiveWindow::Closed => {
                if value > warn_at {
                    debug!(metric = metric.name(), value, timestamp, "Variance window opened");
                    self.live[i] = LiveWindow::Open { start: timestamp, peak: value };
                }
            }
            LiveWindow::Open { start, peak } => {
                let peak = peak.max(value);
                if value <= warn_at {
                    self.close_window(metric, start, timestamp, peak);
                } else {
                    self.live[i] = LiveWindow::Open { start, peak };
                }
            }
        }
    }

    /// Close every open window at the last timestamp seen.
    pub fn close_open_windows(&mut self) {
        let Some(stop) = self.last_timestamp else {
            return;
        };
        for metric in Metric::ALL {
            if let LiveWindow::Open { start, peak } = self.live[metric.index()] {
                debug!(metric = metric.name(), "Force-closing variance window at end of stream");
                self.close_window(metric, start, stop, peak);
            }
        }
    }

    fn close_window(&mut self, metric: Metric, start: u64, stop: u64, peak: f64) {
        let record = ClosedWindowRecord { metric, start, stop, peak };
        trace!(?record, "Variance window closed");
        if let Some(evicted) = self.history.push(record) {
            trace!(?evicted, "Variance history full; evicted oldest window");
        }
        self.live[metric.index()] = LiveWindow::Closed;
    }

    fn window_failed(&self, metric: Metric, peak: f64) -> bool {
        peak >= self.metrics[metric.index()].threshold_fail
    }

    /// Microseconds since the tracker was built.
    fn now_micros(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

impl Handler for VarianceWindowTracker {
    fn name(&self) -> &str {
        Analyzer::name(self)
    }

    fn configure(&mut self, config: &Config) -> bool {
        for (name, thresholds) in config.ekf.entries() {
            if let Err(reason) = thresholds.check() {
                warn!("Rejecting EKF thresholds for {}: {}", name, reason);
                return false;
            }
        }
        self.metrics =
            Metric::ALL.map(|metric| VarianceMetric::new(metric, metric.thresholds(&config.ekf)));
        true
    }

    fn handle_packet(&mut self, packet: &[u8]) {
        if let Some(DecodedMessage::EkfStatusReport(report)) = decode_frame(packet) {
            self.handle_decoded(self.now_micros(), &report);
        }
    }

    fn end_of_stream(&mut self, packet_count: u32, bytes_dropped: u64) {
        self.close_open_windows();
        info!(
            packet_count,
            bytes_dropped,
            windows = self.history.len(),
            failed = self.has_failed(),
            "EKF variance tracking finished"
        );
    }

    fn results(&self) -> Result<Option<serde_json::Value>> {
        self.results_json().map(Some)
    }
}

#[derive(Serialize)]
struct VarianceReport<'a> {
    name: &'static str,
    threshold_warn: f64,
    threshold_fail: f64,
    windows: Vec<&'a ClosedWindowRecord>,
}

#[derive(Serialize)]
struct TrackerReport<'a> {
    name: &'static str,
    description: &'static str,
    status: Status,
    seen_ekf_packets: bool,
    evicted_windows: u64,
    variances: Vec<VarianceReport<'a>>,
}

impl Analyzer for VarianceWindowTracker {
    fn name(&self) -> &'static str {
        "Good EKF"
    }

    fn description(&self) -> &'static str {
        "EKF variances remain within bounds"
    }

    fn has_failed(&self) -> bool {
        let closed =
            self.history.iter().any(|record| self.window_failed(record.metric, record.peak));
        let open = Metric::ALL.iter().any(|&metric| match self.live[metric.index()] {
            LiveWindow::Open { peak, .. } => self.window_failed(metric, peak),
            LiveWindow::Closed => false,
        });
        closed || open
    }

    fn results_json(&self) -> Result<serde_json::Value> {
        let variances = self
            .metrics
            .iter()
            .map(|definition| VarianceReport {
                name: definition.metric.name(),
                threshold_warn: definition.threshold_warn,
                threshold_fail: definition.threshold_fail,
                windows: self.history.iter().filter(|r| r.metric == definition.metric).collect(),
            })
            .collect();

        let report = TrackerReport {
            name: Analyzer::name(self),
            description: self.description(),
            status: self.status(),
            seen_ekf_packets: self.seen_ekf_packets,
            evicted_windows: self.history.evicted(),
            variances,
        };
        serde_json::to_value(&report)
            .map_err(|err| LinkError::serialization(Analyzer::name(self), err))
    }
}
