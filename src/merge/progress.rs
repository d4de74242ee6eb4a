//! Progress reporting for long merges.

use tracing::info;

/// Receives progress updates while a merge runs.
pub trait ProgressSink {
    /// `percent` is in `0.0..=100.0`.
    fn update(&mut self, percent: f64, message: &str);

    /// Called once when the merge ends.
    fn finish(&mut self, success: bool, message: &str);
}

/// Discards all updates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn update(&mut self, _percent: f64, _message: &str) {}

    fn finish(&mut self, _success: bool, _message: &str) {}
}

/// Emits updates as `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn update(&mut self, percent: f64, message: &str) {
        info!(percent = percent.round(), "{message}");
    }

    fn finish(&mut self, success: bool, message: &str) {
        if success {
            info!("{message}");
        } else {
            tracing::warn!("{message}");
        }
    }
}
