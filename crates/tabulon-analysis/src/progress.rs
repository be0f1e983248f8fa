//! Per-file analysis progress (spec.md §4.D), throttled to at most one
//! emission every 500ms regardless of how often blocks complete.

use std::time::{Duration, Instant};

use chrono::Utc;
use tabulon_types::JobId;

const EMIT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct AnalysisProgress {
    pub job_id: JobId,
    pub file_path: String,
    pub blocks_done: usize,
    pub blocks_total: usize,
    pub rows_per_sec: f64,
    pub eta_seconds: Option<f64>,
    pub emitted_at: chrono::DateTime<Utc>,
}

/// Gates `AnalysisProgress` emission to the configured cadence; callers
/// attempt an emit after every block and only a throttled subset go through.
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self { last_emit: None }
    }
}

impl ProgressThrottle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if enough time has elapsed since the last emission.
    pub fn try_emit(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.duration_since(last) < EMIT_INTERVAL => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_emit_always_goes_through() {
        let mut throttle = ProgressThrottle::new();
        assert!(throttle.try_emit(Instant::now()));
    }

    #[test]
    fn rapid_successive_emits_are_throttled() {
        let mut throttle = ProgressThrottle::new();
        let t0 = Instant::now();
        assert!(throttle.try_emit(t0));
        assert!(!throttle.try_emit(t0 + Duration::from_millis(10)));
    }

    #[test]
    fn emit_after_interval_goes_through() {
        let mut throttle = ProgressThrottle::new();
        let t0 = Instant::now();
        assert!(throttle.try_emit(t0));
        assert!(throttle.try_emit(t0 + Duration::from_millis(600)));
    }
}
