//! Adaptive worker sizing (spec.md §4.D): the analysis pool starts at
//! `max_parallel_files` workers and adjusts within `[1, 2 * max_parallel_files]`
//! by comparing the moving average read latency of two consecutive windows —
//! halving when it worsens, doubling when it improves, holding steady
//! otherwise.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const WINDOW: usize = 8;
const WORSEN_FACTOR: f64 = 1.2;
const IMPROVE_FACTOR: f64 = 0.8;

/// Tracks recent per-block read latencies and recommends a worker count.
pub struct AdaptiveConcurrency {
    current: AtomicUsize,
    min_workers: usize,
    max_workers: usize,
    samples: Mutex<VecDeque<f64>>,
}

impl AdaptiveConcurrency {
    #[must_use]
    pub fn new(initial_workers: usize) -> Self {
        let initial = initial_workers.max(1);
        Self {
            current: AtomicUsize::new(initial),
            min_workers: 1,
            max_workers: initial * 2,
            samples: Mutex::new(VecDeque::with_capacity(WINDOW * 2)),
        }
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    /// Record one block's read latency in milliseconds and re-evaluate the
    /// worker count once two full windows of samples have accumulated.
    pub fn record_latency_ms(&self, latency_ms: f64) {
        let mut samples = self.samples.lock().unwrap();
        samples.push_back(latency_ms);
        while samples.len() > WINDOW * 2 {
            samples.pop_front();
        }
        if samples.len() < WINDOW * 2 {
            return;
        }

        let (older, newer): (Vec<f64>, Vec<f64>) = samples
            .iter()
            .copied()
            .enumerate()
            .partition(|(i, _)| *i < WINDOW);
        let older_avg = average(&older.into_iter().map(|(_, v)| v).collect::<Vec<_>>());
        let newer_avg = average(&newer.into_iter().map(|(_, v)| v).collect::<Vec<_>>());

        if older_avg <= 0.0 {
            return;
        }

        let current = self.current.load(Ordering::Relaxed);
        if newer_avg > older_avg * WORSEN_FACTOR {
            let reduced = (current / 2).max(self.min_workers);
            self.current.store(reduced, Ordering::Relaxed);
        } else if newer_avg < older_avg * IMPROVE_FACTOR {
            let increased = (current * 2).min(self.max_workers);
            self.current.store(increased, Ordering::Relaxed);
        }
        samples.clear();
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
