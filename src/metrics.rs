//! Chat Metrics (§2.1 supplement): per-call latency/token bookkeeping kept
//! in memory for the lifetime of a process. No export format is defined —
//! exporting is left to whatever observability stack wraps this crate.

use std::sync::Mutex;
use tokio::time::Instant;

/// One completed provider call's measurements.
#[derive(Debug, Clone)]
pub struct ChatMetric {
    pub model: String,
    pub latency_ms: u64,
    pub tokens_used: Option<u64>,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl ChatMetric {
    pub fn success(
        model: impl Into<String>,
        latency_ms: u64,
        prompt_tokens: Option<u64>,
        completion_tokens: Option<u64>,
    ) -> Self {
        let tokens_used = match (prompt_tokens, completion_tokens) {
            (Some(p), Some(c)) => Some(p + c),
            _ => None,
        };
        Self {
            model: model.into(),
            latency_ms,
            tokens_used,
            prompt_tokens,
            completion_tokens,
            timestamp: chrono::Utc::now(),
            success: true,
            error_message: None,
        }
    }

    pub fn failure(model: impl Into<String>, latency_ms: u64, error_message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            latency_ms,
            tokens_used: None,
            prompt_tokens: None,
            completion_tokens: None,
            timestamp: chrono::Utc::now(),
            success: false,
            error_message: Some(error_message.into()),
        }
    }
}

/// A simple stopwatch for timing one provider call; `elapsed_ms()` feeds a
/// [`ChatMetric`] once the call resolves.
pub struct CallTimer(Instant);

impl CallTimer {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }
}

/// Records completed calls in memory, capped at `capacity` (oldest dropped
/// first). Aggregates are computed on demand rather than kept running, since
/// the metric volume this crate produces never justifies streaming
/// aggregation.
pub struct MetricsRecorder {
    capacity: usize,
    metrics: Mutex<Vec<ChatMetric>>,
}

impl MetricsRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            metrics: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, metric: ChatMetric) {
        let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
        if metrics.len() >= self.capacity {
            metrics.remove(0);
        }
        metrics.push(metric);
    }

    pub fn all(&self) -> Vec<ChatMetric> {
        self.metrics.lock().expect("metrics lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.metrics.lock().expect("metrics lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Average latency across recorded calls, `None` if none recorded.
    pub fn average_latency_ms(&self) -> Option<f64> {
        let metrics = self.metrics.lock().expect("metrics lock poisoned");
        if metrics.is_empty() {
            return None;
        }
        let total: u64 = metrics.iter().map(|m| m.latency_ms).sum();
        Some(total as f64 / metrics.len() as f64)
    }

    pub fn success_count(&self) -> usize {
        self.metrics
            .lock()
            .expect("metrics lock poisoned")
            .iter()
            .filter(|m| m.success)
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.metrics
            .lock()
            .expect("metrics lock poisoned")
            .iter()
            .filter(|m| !m.success)
            .count()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_aggregate() {
        let recorder = MetricsRecorder::new(10);
        recorder.record(ChatMetric::success("gpt-4", 100, Some(50), Some(20)));
        recorder.record(ChatMetric::success("gpt-4", 200, Some(50), Some(20)));
        recorder.record(ChatMetric::failure("gpt-4", 50, "timeout"));

        assert_eq!(recorder.len(), 3);
        assert_eq!(recorder.success_count(), 2);
        assert_eq!(recorder.failure_count(), 1);
        assert_eq!(recorder.average_latency_ms(), Some((100.0 + 200.0 + 50.0) / 3.0));
    }

    #[test]
    fn test_tokens_used_combines_prompt_and_completion() {
        let metric = ChatMetric::success("gpt-4", 10, Some(30), Some(12));
        assert_eq!(metric.tokens_used, Some(42));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let recorder = MetricsRecorder::new(2);
        recorder.record(ChatMetric::success("a", 1, None, None));
        recorder.record(ChatMetric::success("b", 2, None, None));
        recorder.record(ChatMetric::success("c", 3, None, None));

        let all = recorder.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].model, "b");
        assert_eq!(all[1].model, "c");
    }

    #[test]
    fn test_empty_recorder_has_no_average() {
        let recorder = MetricsRecorder::new(10);
        assert_eq!(recorder.average_latency_ms(), None);
    }
}
