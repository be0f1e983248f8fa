//! Materialization scheduler (spec.md §4.H): one task per `SchemaDefinition`,
//! capped at [`MAX_CONCURRENT_SCHEMA_TASKS`] concurrent schema tasks, each
//! driving a single writer through reorder -> validate -> spill -> write ->
//! checkpoint.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;

use tabulon_config::{Profile, ResourceManager};
use tabulon_error::TabulonError;
use tabulon_schema::{reorder_row, validate_row_mut, OffsetMap};
use tabulon_types::{CanonicalSchema, CheckpointRecord, JobId, JobMetrics, MaterializePayload, SchemaId};

use crate::checkpoint::CheckpointRegistry;
use crate::csv_writer::CsvWriterAdapter;
use crate::eta::EtaTracker;
use crate::parquet_writer::ParquetWriterAdapter;
use crate::spill::SpillBuffer;
use crate::sql_writer::SqlWriterAdapter;
use crate::writer::WriterAdapter;

/// Fixed concurrency ceiling from spec.md §4.H: at most two schemas
/// materialize at once, regardless of `max_parallel_files`.
pub const MAX_CONCURRENT_SCHEMA_TASKS: usize = 2;

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    DelimitedText { delimiter: u8 },
    Columnar,
    EmbeddedSql,
}

/// Everything one schema's materialization task needs to run independently.
pub struct SchemaMaterializeSpec {
    pub schema_id: SchemaId,
    /// Ordered (file_path, delimiter) pairs belonging to this schema.
    pub source_files: Vec<(String, u8)>,
    pub canonical_columns: Vec<String>,
    pub offsets_by_file: HashMap<String, OffsetMap>,
    pub has_header_by_file: HashMap<String, bool>,
    pub canonical_schema: Option<CanonicalSchema>,
    pub destination: PathBuf,
    pub output_format: OutputFormat,
}

/// Run every schema's materialize task, at most
/// [`MAX_CONCURRENT_SCHEMA_TASKS`] concurrently.
pub fn materialize_all(
    job_id: &JobId,
    specs: &[SchemaMaterializeSpec],
    profile: &Profile,
    checkpoints: &CheckpointRegistry,
    is_cancelled: &(dyn Fn() -> bool + Sync),
) -> Result<Vec<JobMetrics>, TabulonError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(MAX_CONCURRENT_SCHEMA_TASKS)
        .build()
        .map_err(|e| TabulonError::Config(format!("failed to build materialize pool: {e}")))?;

    // One ResourceManager shared across every schema task so their worker
    // reservations are additive against the same budget, not each starting
    // from a fresh zeroed counter.
    let resources = ResourceManager::new(profile.resource_limits.clone());

    let result = pool.install(|| {
        specs
            .par_iter()
            .map(|spec| materialize_schema(job_id, spec, profile, &resources, checkpoints, is_cancelled))
            .collect()
    });

    // Scratch dirs are removed on every terminal outcome, but a cleanup
    // failure never masks the task result itself.
    let _ = resources.cleanup(&job_id.to_string());
    result
}

/// Drive one schema's output end to end, resuming from any existing
/// checkpoint's chunk cursor.
pub fn materialize_schema(
    job_id: &JobId,
    spec: &SchemaMaterializeSpec,
    profile: &Profile,
    resources: &ResourceManager,
    checkpoints: &CheckpointRegistry,
    is_cancelled: &(dyn Fn() -> bool + Sync),
) -> Result<JobMetrics, TabulonError> {
    // A checkpoint from an earlier, interrupted attempt means any partially
    // written output for this schema can't be trusted: re-materialize this
    // schema from scratch rather than append on top of it, so the resumed
    // run's output is byte-for-byte what a clean run would have produced
    // (spec.md §8 scenario S4) instead of a duplicated tail.
    if checkpoints.load("materialize", &job_id.to_string())?.is_some() {
        clear_existing_chunks(&spec.destination)?;
    }

    let mut writer: Box<dyn WriterAdapter> = match spec.output_format {
        OutputFormat::DelimitedText { delimiter } => Box::new(CsvWriterAdapter::new(
            spec.destination.clone(),
            profile.block_size,
            delimiter,
        )),
        OutputFormat::Columnar => {
            Box::new(ParquetWriterAdapter::new(spec.destination.clone(), profile.block_size))
        }
        OutputFormat::EmbeddedSql => Box::new(SqlWriterAdapter::new(
            spec.destination.clone(),
            spec.schema_id.to_string(),
            profile.block_size,
        )),
    };
    writer.open(&spec.canonical_columns)?;

    // One worker slot against the job's shared budget for the lifetime of
    // this schema's task; released automatically when the lease drops at
    // function exit, success or error alike.
    let _lease = resources.reserve(0, 0, 1)?;

    // Scoped per job/phase/schema so two schemas materializing concurrently
    // (MAX_CONCURRENT_SCHEMA_TASKS > 1) never collide on the same spill file —
    // a flat `temp_dir` keyed only on process id would let them.
    let scratch_dir = resources.scratch_dir(&job_id.to_string(), "materialize", &spec.schema_id.to_string());
    std::fs::create_dir_all(&scratch_dir).map_err(|e| io_err(&scratch_dir, e))?;

    let spill_threshold = (profile.resource_limits.spill_mb.max(1) as usize) * 1000;
    let mut spill = SpillBuffer::new(spill_threshold, &scratch_dir);
    let mut eta = EtaTracker::new();

    let mut metrics = JobMetrics {
        job_id: job_id.to_string(),
        schema_id: spec.schema_id.to_string(),
        ..Default::default()
    };

    let started = Instant::now();
    let mut cumulative_rows: u64 = 0;
    let mut spill_events: u64 = 0;

    for (file_path, delimiter) in &spec.source_files {
        if is_cancelled() {
            writer.close()?;
            return Err(TabulonError::UserAbort);
        }

        let offsets = spec.offsets_by_file.get(file_path).cloned().unwrap_or_default();
        let has_header = spec.has_header_by_file.get(file_path).copied().unwrap_or(false);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(*delimiter)
            .has_headers(has_header)
            .flexible(true)
            .from_path(file_path)
            .map_err(|e| TabulonError::Io {
                path: PathBuf::from(file_path),
                source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            })?;

        for result in reader.records() {
            let record = result.map_err(|e| TabulonError::Parsing {
                file: file_path.clone(),
                line: cumulative_rows,
                reason: e.to_string(),
            })?;
            let raw_row: Vec<String> = record.iter().map(str::to_string).collect();
            let (mut reordered, dropped_extra) = reorder_row(&raw_row, &offsets);
            if dropped_extra > 0 {
                metrics.long_rows += 1;
            }

            if let Some(schema) = &spec.canonical_schema {
                let outcome = validate_row_mut(&mut reordered, schema);
                metrics.missing_required += outcome.missing_required;
                metrics.type_mismatches += outcome.type_mismatches;
            }

            let spilled_before = spill.spilled_rows();
            spill.push(reordered, &scratch_dir)?;
            if spill.spilled_rows() > spilled_before {
                spill_events += 1;
            }

            cumulative_rows += 1;
            metrics.rows += 1;

            if cumulative_rows % profile.block_size == 0 {
                flush_spill(&mut spill, writer.as_mut())?;
                eta.sample(Instant::now(), cumulative_rows);
                save_checkpoint(checkpoints, job_id, &spec.schema_id, writer.as_ref())?;
            }
        }
    }

    flush_spill(&mut spill, writer.as_mut())?;
    writer.close()?;
    checkpoints.remove("materialize", &job_id.to_string())?;

    metrics.duration_ms = started.elapsed().as_millis() as u64;
    metrics.rows_per_sec = eta.rows_per_sec();
    metrics.spill_count = spill_events;
    metrics.rows_spilled = spill.total_spilled_rows();
    Ok(metrics)
}

/// Remove every previously written chunk file for a file-based destination
/// (`<stem>.part00000<ext>`, `<stem>.part00001<ext>`, ...) so a resumed
/// materialize starts from a clean slate instead of appending past
/// already-written rows. A no-op for destinations with no matching files
/// (embedded-SQL destinations rotate via transaction commit, not file
/// rotation, and aren't touched here).
fn clear_existing_chunks(destination: &std::path::Path) -> Result<(), TabulonError> {
    let Some(parent) = destination.parent() else {
        return Ok(());
    };
    if !parent.exists() {
        return Ok(());
    }
    let Some(stem) = destination.file_stem().and_then(|s| s.to_str()) else {
        return Ok(());
    };
    let prefix = format!("{stem}.part");
    for entry in std::fs::read_dir(parent).map_err(|e| io_err(parent, e))? {
        let entry = entry.map_err(|e| io_err(parent, e))?;
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            let _ = std::fs::remove_file(entry.path());
        }
    }
    Ok(())
}

fn io_err(path: &std::path::Path, e: std::io::Error) -> TabulonError {
    TabulonError::Io { path: path.to_path_buf(), source: e }
}

fn flush_spill(spill: &mut SpillBuffer, writer: &mut dyn WriterAdapter) -> Result<(), TabulonError> {
    let rows = spill.drain_all()?;
    if !rows.is_empty() {
        writer.write_rows(&rows)?;
    }
    Ok(())
}

fn save_checkpoint(
    checkpoints: &CheckpointRegistry,
    job_id: &JobId,
    schema_id: &SchemaId,
    writer: &dyn WriterAdapter,
) -> Result<(), TabulonError> {
    let mut payload = MaterializePayload::new();
    payload
        .chunk_ordinal_by_output
        .insert(schema_id.to_string(), writer.rows_in_current_chunk());
    let record = CheckpointRecord {
        job_id: job_id.clone(),
        phase: "materialize".to_string(),
        payload_json: payload.to_json(),
        updated_at: chrono::Utc::now(),
    };
    checkpoints.save(&record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &std::path::Path, name: &str, content: &str) -> String {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn materializes_a_single_schema_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_csv(dir.path(), "in.csv", "name,age\nAlice,30\nBob,41\n");
        let checkpoints = CheckpointRegistry::new(dir.path().to_path_buf());
        let profile = Profile::low_memory();

        let spec = SchemaMaterializeSpec {
            schema_id: SchemaId::from("s1"),
            source_files: vec![(source, b',')],
            canonical_columns: vec!["name".to_string(), "age".to_string()],
            offsets_by_file: HashMap::new(),
            has_header_by_file: {
                let mut m = HashMap::new();
                m.insert(dir.path().join("in.csv").to_str().unwrap().to_string(), true);
                m
            },
            canonical_schema: None,
            destination: dir.path().join("out.csv"),
            output_format: OutputFormat::DelimitedText { delimiter: b',' },
        };

        let resources = ResourceManager::new(profile.resource_limits.clone());
        let metrics = materialize_schema(&JobId::from("job-1"), &spec, &profile, &resources, &checkpoints, &|| false).unwrap();
        assert_eq!(metrics.rows, 2);
        assert!(dir.path().join("out.part00000.csv").exists());
    }

    #[test]
    fn materialize_all_runs_two_schemas_without_cross_contaminating_spill_files() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoints = CheckpointRegistry::new(dir.path().to_path_buf());
        let mut profile = Profile::low_memory();
        profile.resource_limits.spill_mb = 1; // force every row through the spill buffer
        profile.resource_limits.temp_dir = dir.path().to_path_buf();

        let source_a = write_csv(dir.path(), "a.csv", "name,age\nAlice,30\nBob,41\n");
        let source_b = write_csv(dir.path(), "b.csv", "city,pop\nOslo,1\nBergen,2\n");

        let spec_a = SchemaMaterializeSpec {
            schema_id: SchemaId::from("sa"),
            source_files: vec![(source_a, b',')],
            canonical_columns: vec!["name".to_string(), "age".to_string()],
            offsets_by_file: HashMap::new(),
            has_header_by_file: {
                let mut m = HashMap::new();
                m.insert(dir.path().join("a.csv").to_str().unwrap().to_string(), true);
                m
            },
            canonical_schema: None,
            destination: dir.path().join("out_a.csv"),
            output_format: OutputFormat::DelimitedText { delimiter: b',' },
        };
        let spec_b = SchemaMaterializeSpec {
            schema_id: SchemaId::from("sb"),
            source_files: vec![(source_b, b',')],
            canonical_columns: vec!["city".to_string(), "pop".to_string()],
            offsets_by_file: HashMap::new(),
            has_header_by_file: {
                let mut m = HashMap::new();
                m.insert(dir.path().join("b.csv").to_str().unwrap().to_string(), true);
                m
            },
            canonical_schema: None,
            destination: dir.path().join("out_b.csv"),
            output_format: OutputFormat::DelimitedText { delimiter: b',' },
        };

        let job_id = JobId::from("job-concurrent");
        let metrics = materialize_all(&job_id, &[spec_a, spec_b], &profile, &checkpoints, &|| false).unwrap();
        assert_eq!(metrics.len(), 2);
        for m in &metrics {
            assert_eq!(m.rows, 2);
        }

        let content_a = std::fs::read_to_string(dir.path().join("out_a.part00000.csv")).unwrap();
        let content_b = std::fs::read_to_string(dir.path().join("out_b.part00000.csv")).unwrap();
        assert!(content_a.contains("Alice"));
        assert!(content_b.contains("Oslo"));

        // The job's shared scratch tree is gone once every task has returned.
        assert!(!dir.path().join(job_id.to_string()).exists());
    }

    #[test]
    fn cancellation_before_start_aborts_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_csv(dir.path(), "in.csv", "a,b\n1,2\n");
        let checkpoints = CheckpointRegistry::new(dir.path().to_path_buf());
        let profile = Profile::low_memory();

        let spec = SchemaMaterializeSpec {
            schema_id: SchemaId::from("s2"),
            source_files: vec![(source, b',')],
            canonical_columns: vec!["a".to_string(), "b".to_string()],
            offsets_by_file: HashMap::new(),
            has_header_by_file: HashMap::new(),
            canonical_schema: None,
            destination: dir.path().join("out2.csv"),
            output_format: OutputFormat::DelimitedText { delimiter: b',' },
        };

        let resources = ResourceManager::new(profile.resource_limits.clone());
        let err = materialize_schema(&JobId::from("job-2"), &spec, &profile, &resources, &checkpoints, &|| true).unwrap_err();
        assert_eq!(err.code(), "USER_ABORT");
    }

    #[test]
    fn resuming_from_a_stale_checkpoint_does_not_duplicate_rows() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_csv(dir.path(), "in.csv", "name,age\nAlice,30\nBob,41\n");
        let checkpoints = CheckpointRegistry::new(dir.path().to_path_buf());
        let profile = Profile::low_memory();

        let spec = SchemaMaterializeSpec {
            schema_id: SchemaId::from("s3"),
            source_files: vec![(source, b',')],
            canonical_columns: vec!["name".to_string(), "age".to_string()],
            offsets_by_file: HashMap::new(),
            has_header_by_file: {
                let mut m = HashMap::new();
                m.insert(dir.path().join("in.csv").to_str().unwrap().to_string(), true);
                m
            },
            canonical_schema: None,
            destination: dir.path().join("out3.csv"),
            output_format: OutputFormat::DelimitedText { delimiter: b',' },
        };

        let job_id = JobId::from("job-3");
        let resources = ResourceManager::new(profile.resource_limits.clone());
        materialize_schema(&job_id, &spec, &profile, &resources, &checkpoints, &|| false).unwrap();

        // Simulate a crash mid-materialize: a checkpoint is left behind from
        // the previous (now-stale) attempt.
        checkpoints
            .save(&tabulon_types::CheckpointRecord {
                job_id: job_id.clone(),
                phase: "materialize".to_string(),
                payload_json: serde_json::json!({}),
                updated_at: chrono::Utc::now(),
            })
            .unwrap();

        let metrics = materialize_schema(&job_id, &spec, &profile, &resources, &checkpoints, &|| false).unwrap();
        assert_eq!(metrics.rows, 2);

        let content = std::fs::read_to_string(dir.path().join("out3.part00000.csv")).unwrap();
        assert_eq!(content.lines().count(), 3, "header + 2 rows, not duplicated: {content:?}");
    }
}
