use std::sync::Mutex;

/// Counters behind the diagnostics view; nothing here is user-facing.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub polls: usize,
    pub transport_failures: usize,
    pub visualization_failures: usize,
    pub position_samples: usize,
}

struct Metrics {
    polls: usize,
    transport_failures: usize,
    visualization_failures: usize,
    position_samples: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics {
                polls: 0,
                transport_failures: 0,
                visualization_failures: 0,
                position_samples: 0,
            }),
        }
    }

    pub fn record_poll(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.polls += 1;
        }
    }

    pub fn record_transport_failure(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.transport_failures += 1;
        }
    }

    pub fn record_visualization_failure(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.visualization_failures += 1;
        }
    }

    pub fn record_position_sample(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.position_samples += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                polls: metrics.polls,
                transport_failures: metrics.transport_failures,
                visualization_failures: metrics.visualization_failures,
                position_samples: metrics.position_samples,
            }
        } else {
            MetricsSnapshot::default()
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
    fn counters_accumulate_independently() {
        let metrics = MetricsRecorder::new();
        metrics.record_poll();
        metrics.record_poll();
        metrics.record_visualization_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.polls, 2);
        assert_eq!(snapshot.visualization_failures, 1);
        assert_eq!(snapshot.transport_failures, 0);
        assert_eq!(snapshot.position_samples, 0);
    }
}
