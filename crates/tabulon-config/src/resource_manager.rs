//! Shared resource budgets (spec.md §5): a lease-based guard over a
//! profile's `ResourceLimits`, plus the job-scoped scratch directory
//! convention every phase writes spill/temp files under.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tabulon_error::TabulonError;

use crate::ResourceLimits;

#[derive(Debug, Default)]
struct Usage {
    memory_mb: u64,
    spill_mb: u64,
    workers: usize,
}

/// Tracks how much of a profile's `{memory_mb, spill_mb, max_workers}`
/// budget is currently leased out. Cheap to clone: every clone shares the
/// same underlying counters.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    limits: ResourceLimits,
    usage: Arc<Mutex<Usage>>,
}

/// A reservation against a [`ResourceManager`]'s budget. Dropping it
/// releases its share of `memory_mb`/`spill_mb`/workers back to the pool
/// automatically — callers never call a matching `release()` themselves.
pub struct Lease {
    manager: ResourceManager,
    memory_mb: u64,
    spill_mb: u64,
    workers: usize,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut usage = self.manager.usage.lock().expect("resource manager mutex poisoned");
        usage.memory_mb = usage.memory_mb.saturating_sub(self.memory_mb);
        usage.spill_mb = usage.spill_mb.saturating_sub(self.spill_mb);
        usage.workers = usage.workers.saturating_sub(self.workers);
    }
}

impl ResourceManager {
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            usage: Arc::new(Mutex::new(Usage::default())),
        }
    }

    /// Reserve `memory_mb`/`disk_mb`/`workers` against the budget, failing
    /// fast with `ResourceLimitExceeded` the moment any one of the three
    /// would be overdrawn. Whatever was reserved before the failing check is
    /// rolled back, not left half-applied.
    pub fn reserve(&self, memory_mb: u64, disk_mb: u64, workers: usize) -> Result<Lease, TabulonError> {
        let mut usage = self.usage.lock().expect("resource manager mutex poisoned");

        let over_budget = |resource: &str, requested, in_use: u64, limit: u64| -> Option<TabulonError> {
            if in_use + requested > limit {
                Some(TabulonError::ResourceLimitExceeded {
                    resource: resource.to_string(),
                    limit: limit.to_string(),
                })
            } else {
                None
            }
        };

        if let Some(e) = over_budget("memory_mb", memory_mb, usage.memory_mb, self.limits.memory_mb) {
            return Err(e);
        }
        if let Some(e) = over_budget("spill_mb", disk_mb, usage.spill_mb, self.limits.spill_mb) {
            return Err(e);
        }
        if let Some(e) = over_budget("max_workers", workers as u64, usage.workers as u64, self.limits.max_workers as u64) {
            return Err(e);
        }

        usage.memory_mb += memory_mb;
        usage.spill_mb += disk_mb;
        usage.workers += workers;
        drop(usage);

        Ok(Lease {
            manager: self.clone(),
            memory_mb,
            spill_mb: disk_mb,
            workers,
        })
    }

    /// The scratch directory a phase should use for one schema's temp/spill
    /// files: `temp_dir/<job_id>/<phase>/<schema_slug>/`. Callers are
    /// responsible for creating it (`std::fs::create_dir_all`) before use.
    #[must_use]
    pub fn scratch_dir(&self, job_id: &str, phase: &str, schema_slug: &str) -> PathBuf {
        self.limits.temp_dir.join(job_id).join(phase).join(schema_slug)
    }

    /// Remove a job's entire scratch tree. Called on terminal job states
    /// (`Done`, `Failed`, `Cancelled`); a no-op if nothing was ever written.
    pub fn cleanup(&self, job_id: &str) -> Result<(), TabulonError> {
        let job_dir = self.limits.temp_dir.join(job_id);
        if !job_dir.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(&job_dir).map_err(|e| TabulonError::Io { path: job_dir, source: e })
    }

    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ResourceLimits {
        ResourceLimits {
            memory_mb: 100,
            spill_mb: 50,
            max_workers: 4,
            temp_dir: std::env::temp_dir(),
        }
    }

    #[test]
    fn reserve_within_budget_succeeds() {
        let manager = ResourceManager::new(limits());
        let lease = manager.reserve(50, 10, 2).unwrap();
        drop(lease);
    }

    #[test]
    fn reserve_past_memory_budget_fails_fast() {
        let manager = ResourceManager::new(limits());
        let err = manager.reserve(101, 0, 0).unwrap_err();
        assert_eq!(err.code(), "RESOURCE_LIMIT_EXCEEDED");
    }

    #[test]
    fn releasing_a_lease_frees_its_share_for_reuse() {
        let manager = ResourceManager::new(limits());
        {
            let _lease = manager.reserve(90, 0, 0).unwrap();
            assert!(manager.reserve(20, 0, 0).is_err());
        }
        assert!(manager.reserve(20, 0, 0).is_ok());
    }

    #[test]
    fn concurrent_reservations_are_additive() {
        let manager = ResourceManager::new(limits());
        let _a = manager.reserve(60, 0, 0).unwrap();
        let _b = manager.reserve(30, 0, 0).unwrap();
        assert!(manager.reserve(20, 0, 0).is_err());
    }

    #[test]
    fn scratch_dir_follows_the_job_phase_schema_convention() {
        let manager = ResourceManager::new(limits());
        let dir = manager.scratch_dir("job-1", "materialize", "schema-0001");
        assert!(dir.ends_with("job-1/materialize/schema-0001"));
    }

    #[test]
    fn cleanup_on_a_job_with_no_scratch_dir_is_a_no_op() {
        let manager = ResourceManager::new(limits());
        manager.cleanup("never-ran").unwrap();
    }

    #[test]
    fn cleanup_removes_the_whole_job_scratch_tree() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = limits();
        l.temp_dir = dir.path().to_path_buf();
        let manager = ResourceManager::new(l);

        let schema_dir = manager.scratch_dir("job-9", "materialize", "schema-0001");
        std::fs::create_dir_all(&schema_dir).unwrap();
        std::fs::write(schema_dir.join("spill.jsonl"), b"x").unwrap();

        manager.cleanup("job-9").unwrap();
        assert!(!dir.path().join("job-9").exists());
    }
}
