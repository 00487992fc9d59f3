use log::{debug, info};

/// Thin facade over the `log` crate so the driver and strategies share one
/// logging surface.
pub struct LogManager;

impl LogManager {
    pub fn new() -> Self {
        Self
    }

    /// Run-level events (start, summary).
    pub fn record(&self, message: &str) {
        info!("{}", message);
    }

    /// Per-chunk progress; only visible at debug level unless the caller
    /// asked for progress reporting.
    pub fn record_progress(&self, message: &str) {
        debug!("{}", message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
