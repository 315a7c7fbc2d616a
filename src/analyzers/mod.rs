//! Analyzers that judge a flight from its telemetry.
//!
//! An analyzer is a [`Handler`](crate::Handler) that also satisfies the
//! result contract below, so the reporting layer can ask it for a verdict and
//! a JSON document once the stream has ended.

use serde::Serialize;

use crate::Result;

pub mod ekf;
pub mod history;

pub use ekf::{ClosedWindowRecord, LiveWindow, Metric, VarianceMetric, VarianceWindowTracker};
pub use history::{HISTORY_CAPACITY, HistoryBuffer};

/// Overall verdict of an analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
}

impl Status {
    pub fn from_failed(failed: bool) -> Self {
        if failed { Status::Fail } else { Status::Pass }
    }
}

/// Result contract between analyzers and the reporting layer.
pub trait Analyzer {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Whether anything observed so far crosses a failure threshold.
    fn has_failed(&self) -> bool;

    fn status(&self) -> Status {
        Status::from_failed(self.has_failed())
    }

    /// Structured result document.
    fn results_json(&self) -> Result<serde_json::Value>;
}
