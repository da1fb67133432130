use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Process-wide counters read by the alert rules and the status log
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    /// Worker cycles completed, successful or not
    pub worker_cycles: AtomicU64,
    /// Worker cycles that ended in an error or panic
    pub worker_failures: AtomicU64,
    /// Notification send attempts
    pub channel_sends: AtomicU64,
    /// Notification send failures
    pub channel_failures: AtomicU64,
    /// Signals persisted by the analysis job
    pub signals_emitted: AtomicU64,
    /// Matches upserted by the last ingestion cycle
    active_matches: AtomicU64,
    /// Workers reported unhealthy by the last health check
    unhealthy_workers: AtomicU64,
    /// f64 bits of the overall settled accuracy; u64::MAX when unknown
    model_accuracy_bits: AtomicU64,
    model_samples: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub worker_cycles: u64,
    pub worker_failures: u64,
    pub channel_sends: u64,
    pub channel_failures: u64,
    pub signals_emitted: u64,
    pub active_matches: u64,
    pub unhealthy_workers: u64,
    pub model_accuracy: Option<f64>,
    pub model_samples: u64,
}

impl MetricsSnapshot {
    pub fn error_rate(&self) -> f64 {
        ratio(self.worker_failures, self.worker_cycles)
    }

    pub fn channel_failure_rate(&self) -> f64 {
        ratio(self.channel_failures, self.channel_sends)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self {
            model_accuracy_bits: AtomicU64::new(u64::MAX),
            ..Self::default()
        }
    }

    pub fn record_cycle(&self, success: bool) {
        self.worker_cycles.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.worker_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_send(&self, success: bool) {
        self.channel_sends.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.channel_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_signals(&self) {
        self.signals_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_active_matches(&self, count: u64) {
        self.active_matches.store(count, Ordering::Relaxed);
    }

    pub fn set_unhealthy_workers(&self, count: u64) {
        self.unhealthy_workers.store(count, Ordering::Relaxed);
    }

    pub fn set_model_accuracy(&self, accuracy: f64, samples: u64) {
        self.model_accuracy_bits
            .store(accuracy.to_bits(), Ordering::Relaxed);
        self.model_samples.store(samples, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let bits = self.model_accuracy_bits.load(Ordering::Relaxed);
        MetricsSnapshot {
            worker_cycles: self.worker_cycles.load(Ordering::Relaxed),
            worker_failures: self.worker_failures.load(Ordering::Relaxed),
            channel_sends: self.channel_sends.load(Ordering::Relaxed),
            channel_failures: self.channel_failures.load(Ordering::Relaxed),
            signals_emitted: self.signals_emitted.load(Ordering::Relaxed),
            active_matches: self.active_matches.load(Ordering::Relaxed),
            unhealthy_workers: self.unhealthy_workers.load(Ordering::Relaxed),
            model_accuracy: (bits != u64::MAX).then(|| f64::from_bits(bits)),
            model_samples: self.model_samples.load(Ordering::Relaxed),
        }
    }

    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"
=== BETSIGNAL STATUS ===
Cycles: {} | Failures: {} ({:.1}%)
Signals: {} | Active matches: {}
Sends: {} | Send failures: {}
Accuracy: {} over {} settled
========================
"#,
            s.worker_cycles,
            s.worker_failures,
            s.error_rate() * 100.0,
            s.signals_emitted,
            s.active_matches,
            s.channel_sends,
            s.channel_failures,
            s.model_accuracy
                .map(|a| format!("{:.1}%", a * 100.0))
                .unwrap_or_else(|| "n/a".to_string()),
            s.model_samples,
        )
    }

    pub fn log_status(&self) {
        info!("{}", self.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_handle_zero_totals() {
        let metrics = RuntimeMetrics::new();
        let s = metrics.snapshot();
        assert_eq!(s.error_rate(), 0.0);
        assert_eq!(s.channel_failure_rate(), 0.0);
        assert!(s.model_accuracy.is_none());
    }

    #[test]
    fn counters_accumulate() {
        let metrics = RuntimeMetrics::new();
        metrics.record_cycle(true);
        metrics.record_cycle(true);
        metrics.record_cycle(true);
        metrics.record_cycle(false);
        metrics.record_send(false);
        metrics.set_model_accuracy(0.58, 120);
        metrics.set_active_matches(12);

        let s = metrics.snapshot();
        assert_eq!(s.worker_cycles, 4);
        assert!((s.error_rate() - 0.25).abs() < 1e-12);
        assert_eq!(s.channel_failure_rate(), 1.0);
        assert_eq!(s.model_accuracy, Some(0.58));
        assert_eq!(s.active_matches, 12);
        assert!(metrics.summary().contains("58.0%"));
    }
}
