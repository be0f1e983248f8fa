//! Worker-Pool Orchestrator (spec.md §4.D): drives the Sampling Planner and
//! Signature & Column Profiler across a file set with a rayon-backed worker
//! pool, adaptive concurrency, throttled progress, and cooperative
//! cancellation.

pub mod cancellation;
pub mod concurrency;
pub mod progress;

pub use cancellation::CancellationToken;
pub use concurrency::AdaptiveConcurrency;
pub use progress::{AnalysisProgress, ProgressThrottle};

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use tabulon_config::Profile;
use tabulon_error::TabulonError;
use tabulon_types::{FileBlock, JobId};

/// Result of analyzing one file: its path and the `FileBlock`s sampled from it.
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    pub file_path: String,
    pub blocks: Vec<FileBlock>,
}

/// Analyze every file in `files`, sized by `profile.max_parallel_files` and
/// adapted per block-read latency. `on_progress` is invoked at most once per
/// 500ms per file; cooperative cancellation is checked between files and
/// between blocks within a file.
pub fn analyze_files(
    job_id: &JobId,
    files: &[String],
    profile: &Profile,
    cancel: &CancellationToken,
    on_progress: impl Fn(AnalysisProgress) + Sync,
) -> Result<Vec<FileAnalysis>, TabulonError> {
    // `max_parallel_files` picks the file-level fan-out; `resource_limits.max_workers`
    // is the hard ceiling spec.md §5's ResourceManager enforces on top of it.
    let starting_workers = profile.max_parallel_files.min(profile.resource_limits.max_workers);
    let concurrency = AdaptiveConcurrency::new(starting_workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.workers().max(1))
        .build()
        .map_err(|e| TabulonError::Config(format!("failed to build worker pool: {e}")))?;

    pool.install(|| {
        files
            .par_iter()
            .map(|file_path| analyze_one_file(job_id, file_path, profile, &concurrency, cancel, &on_progress))
            .collect::<Result<Vec<_>, _>>()
    })
}

fn analyze_one_file(
    job_id: &JobId,
    file_path: &str,
    profile: &Profile,
    concurrency: &AdaptiveConcurrency,
    cancel: &CancellationToken,
    on_progress: &(impl Fn(AnalysisProgress) + Sync),
) -> Result<FileAnalysis, TabulonError> {
    if cancel.is_cancelled() {
        return Err(TabulonError::UserAbort);
    }

    let path = Path::new(file_path);
    let total_lines = tabulon_sampling::count_lines(path)?;
    let indices = tabulon_sampling::sample_indices(total_lines, profile.block_size / 2);
    let planned = tabulon_sampling::blocks_from_indices(&indices, profile.block_size, total_lines);
    // One linear pass locates every block's byte span up front, so reading
    // `planned.len()` blocks out of the same file costs one scan, not
    // `planned.len()` rescans from byte 0.
    let byte_spans = tabulon_sampling::locate_block_offsets(path, &planned)?;

    let mut blocks = Vec::with_capacity(planned.len());
    let mut throttle = ProgressThrottle::new();
    let mut rows_seen: u64 = 0;
    let started = Instant::now();

    for (i, (planned_block, byte_span)) in planned.iter().zip(byte_spans.iter()).enumerate() {
        if cancel.is_cancelled() {
            return Err(TabulonError::UserAbort);
        }

        let read_started = Instant::now();
        let raw = tabulon_sampling::read_block_at(path, planned_block, *byte_span)?;
        let latency_ms = read_started.elapsed().as_secs_f64() * 1000.0;
        concurrency.record_latency_ms(latency_ms);

        let block = tabulon_profiler::profile_block(
            file_path,
            planned_block.start_line,
            planned_block.end_line,
            *byte_span,
            &raw,
            profile,
        )?;
        rows_seen += (planned_block.end_line - planned_block.start_line) as u64;
        blocks.push(block);

        let now = Instant::now();
        if throttle.try_emit(now) {
            let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
            let rows_per_sec = rows_seen as f64 / elapsed;
            let remaining_blocks = planned.len() - (i + 1);
            let eta_seconds = if rows_per_sec > 0.0 && remaining_blocks > 0 {
                Some(remaining_blocks as f64 * (profile.block_size as f64 / rows_per_sec))
            } else {
                None
            };
            on_progress(AnalysisProgress {
                job_id: job_id.clone(),
                file_path: file_path.to_string(),
                blocks_done: i + 1,
                blocks_total: planned.len(),
                rows_per_sec,
                eta_seconds,
                emitted_at: chrono::Utc::now(),
            });
        }
    }

    Ok(FileAnalysis {
        file_path: file_path.to_string(),
        blocks,
    })
}
