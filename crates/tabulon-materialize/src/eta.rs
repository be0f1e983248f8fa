//! ETA tracking (spec.md §4.H): an exponentially-smoothed rows/sec estimate
//! with a 30-second time constant, so a brief stall or burst doesn't swing
//! the reported ETA wildly.

use std::time::Instant;

const TIME_CONSTANT_SECS: f64 = 30.0;

pub struct EtaTracker {
    smoothed_rows_per_sec: Option<f64>,
    last_sample: Option<(Instant, u64)>,
}

impl Default for EtaTracker {
    fn default() -> Self {
        Self {
            smoothed_rows_per_sec: None,
            last_sample: None,
        }
    }
}

impl EtaTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `cumulative_rows` have been written as of `now`, folding
    /// the instantaneous rate into the smoothed estimate.
    pub fn sample(&mut self, now: Instant, cumulative_rows: u64) {
        if let Some((last_time, last_rows)) = self.last_sample {
            let dt = now.duration_since(last_time).as_secs_f64();
            if dt > 0.0 && cumulative_rows >= last_rows {
                let instant_rate = (cumulative_rows - last_rows) as f64 / dt;
                let alpha = 1.0 - (-dt / TIME_CONSTANT_SECS).exp();
                self.smoothed_rows_per_sec = Some(match self.smoothed_rows_per_sec {
                    Some(prev) => alpha * instant_rate + (1.0 - alpha) * prev,
                    None => instant_rate,
                });
            }
        }
        self.last_sample = Some((now, cumulative_rows));
    }

    #[must_use]
    pub fn rows_per_sec(&self) -> f64 {
        self.smoothed_rows_per_sec.unwrap_or(0.0)
    }

    #[must_use]
    pub fn eta_seconds(&self, remaining_rows: u64) -> Option<f64> {
        let rate = self.smoothed_rows_per_sec?;
        if rate <= 0.0 {
            None
        } else {
            Some(remaining_rows as f64 / rate)
        }
    }
}
