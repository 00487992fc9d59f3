use std::sync::Mutex;

/// Counts localized peaks and NaN fallback records for end-of-run reporting.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

struct Metrics {
    localized: usize,
    fallbacks: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics {
                localized: 0,
                fallbacks: 0,
            }),
        }
    }

    pub fn record_localized(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.localized += 1;
        }
    }

    pub fn record_fallback(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.fallbacks += 1;
        }
    }

    pub fn snapshot(&self) -> (usize, usize) {
        if let Ok(metrics) = self.inner.lock() {
            (metrics.localized, metrics.fallbacks)
        } else {
            (0, 0)
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counts() {
        let metrics = MetricsRecorder::new();
        metrics.record_localized();
        metrics.record_localized();
        metrics.record_fallback();
        assert_eq!(metrics.snapshot(), (2, 1));
    }
}
