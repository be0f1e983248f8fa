//! Configuration profiles (spec.md §6): `{block_size, max_parallel_files,
//! sample_values_cap, resource_limits}`. Any numeric combination is valid;
//! `low_memory` and `workstation` are recognized names by convention, not
//! hardcoded branches in the reader.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tabulon_error::TabulonError;

pub mod resource_manager;
pub use resource_manager::{Lease, ResourceManager};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_mb: u64,
    pub spill_mb: u64,
    pub max_workers: usize,
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub block_size: u64,
    pub max_parallel_files: usize,
    pub sample_values_cap: usize,
    pub resource_limits: ResourceLimits,
    /// Tunable from spec.md §9's open question: header-nontext ratio used by
    /// the profiler's header-detection heuristic. Default 0.7.
    #[serde(default = "Profile::default_header_nontext_ratio")]
    pub header_nontext_ratio: f64,
}

impl Profile {
    fn default_header_nontext_ratio() -> f64 {
        0.7
    }

    /// `low_memory`: 1000 block size / 1 parallel file / 24 max workers.
    #[must_use]
    pub fn low_memory() -> Self {
        Self {
            block_size: 1000,
            max_parallel_files: 1,
            sample_values_cap: 16,
            resource_limits: ResourceLimits {
                memory_mb: 256,
                spill_mb: 512,
                max_workers: 24,
                temp_dir: std::env::temp_dir(),
            },
            header_nontext_ratio: Self::default_header_nontext_ratio(),
        }
    }

    /// `workstation`: 10000 block size / 4 parallel files / 64 max workers.
    #[must_use]
    pub fn workstation() -> Self {
        Self {
            block_size: 10_000,
            max_parallel_files: 4,
            sample_values_cap: 64,
            resource_limits: ResourceLimits {
                memory_mb: 4096,
                spill_mb: 8192,
                max_workers: 64,
                temp_dir: std::env::temp_dir(),
            },
            header_nontext_ratio: Self::default_header_nontext_ratio(),
        }
    }

    /// Resolve a profile by convention name, falling back to reading a TOML
    /// file at the given path if the name isn't recognized.
    pub fn resolve(name_or_path: &str) -> Result<Self, TabulonError> {
        match name_or_path {
            "low_memory" => Ok(Self::low_memory()),
            "workstation" => Ok(Self::workstation()),
            path => Self::from_file(Path::new(path)),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, TabulonError> {
        let text = std::fs::read_to_string(path).map_err(|source| TabulonError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|e| TabulonError::Config(format!("{path:?}: {e}")))
    }

    /// CONFIG_ERROR if any field is non-sensical (zero capacities etc).
    pub fn validate(&self) -> Result<(), TabulonError> {
        if self.block_size == 0 {
            return Err(TabulonError::Config("block_size must be > 0".into()));
        }
        if self.max_parallel_files == 0 {
            return Err(TabulonError::Config(
                "max_parallel_files must be > 0".into(),
            ));
        }
        if self.resource_limits.max_workers == 0 {
            return Err(TabulonError::Config(
                "resource_limits.max_workers must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Attribution of where a configuration value ultimately came from, used by
/// `status`-style reporting to show effective configuration (CLI > file >
/// defaults precedence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    Cli,
    File,
    Default,
}
