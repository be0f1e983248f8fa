//! Command handlers: each `execute_*` function composes the library crates
//! into one verb from the pipeline's external interface. Business logic here
//! is orchestration only — sampling, profiling, clustering, and writing all
//! live downstream.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use tabulon_analysis::{analyze_files, CancellationToken, FileAnalysis};
use tabulon_cluster::{build_clusters, HeaderCandidate};
use tabulon_config::Profile;
use tabulon_error::TabulonError;
use tabulon_materialize::{
    materialize_all, CheckpointRegistry, OutputFormat, SchemaMaterializeSpec,
};
use tabulon_schema::{detect_offsets, OffsetMap};
use tabulon_storage::Store;
use tabulon_types::{
    CanonicalSchema, ColumnBinding, DiscoveredColumn, FileBlock, HeaderClusterDocument, JobEvent,
    JobId, JobState, JobStatus, MappingDocument, SchemaDefinition, SchemaId, SchemaMapping,
};

use super::args::WriterFormat;

fn discover_files(dir: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    visit(dir, &mut out)?;
    out.sort();
    Ok(out)
}

fn visit(dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("reading directory {dir:?}"))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            visit(&path, out)?;
            continue;
        }
        let is_tabular = matches!(
            path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
            Some("csv") | Some("tsv") | Some("txt")
        );
        if is_tabular {
            out.push(path.to_string_lossy().into_owned());
        }
    }
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes).with_context(|| format!("writing {path:?}"))?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("reading {path:?}"))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn append_jsonl<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", serde_json::to_string(value)?)?;
    Ok(())
}

// --- analyze ---------------------------------------------------------------

pub fn execute_analyze(
    input: &Path,
    profile_name: &str,
    progress_log: Option<&Path>,
    store_path: &Path,
    out_dir: &Path,
    job_id: Option<String>,
) -> Result<()> {
    let profile = Profile::resolve(profile_name)?;
    profile.validate()?;

    let files = discover_files(input)?;
    if files.is_empty() {
        bail!("no .csv/.tsv/.txt files found under {input:?}");
    }

    let job_id = JobId::from(job_id.unwrap_or_else(|| format!("analyze-{}", chrono::Utc::now().timestamp_millis())));
    let cancel = CancellationToken::new();

    let store = Store::open(store_path)?;
    let now = chrono::Utc::now();
    let mut status = JobStatus::new(job_id.clone(), now);
    status.state = JobState::Analyzing;
    store.upsert_job_status(&status)?;

    let results: Vec<FileAnalysis> = analyze_files(&job_id, &files, &profile, &cancel, |p| {
        info!(file = %p.file_path, blocks_done = p.blocks_done, blocks_total = p.blocks_total, "analysis progress");
        if let Some(log_path) = progress_log {
            let _ = append_jsonl(log_path, &p);
        }
    })
    .map_err(anyhow::Error::from)?;

    let doc = group_into_schemas(results);

    for block in &doc.blocks {
        store.save_block(block)?;
    }
    for schema in &doc.schemas {
        store.save_schema_definition(schema)?;
    }

    fs::create_dir_all(out_dir)?;
    write_json(&out_dir.join("mapping.json"), &doc)?;
    let sidecar = doc.column_profiles_sidecar();
    write_json(&out_dir.join("mapping.column_profiles.json"), &sidecar)?;

    status.state = JobState::Mapping;
    status.updated_at = chrono::Utc::now();
    store.upsert_job_status(&status)?;
    store.record_job_event(&JobEvent {
        job_id: job_id.clone(),
        state: JobState::Mapping,
        detail: Some(format!("{} schemas discovered across {} files", doc.schemas.len(), files.len())),
        at: chrono::Utc::now(),
    })?;
    store.append_audit_log(Some(&job_id.to_string()), "analyze completed")?;

    info!(job_id = %job_id, schemas = doc.schemas.len(), "analyze complete");
    Ok(())
}

/// Group every analyzed file's blocks into schemas by signature equality
/// (delimiter, column count, and per-column dominant types).
fn group_into_schemas(results: Vec<FileAnalysis>) -> MappingDocument {
    let mut doc = MappingDocument::new();
    let mut group_of: HashMap<(tabulon_types::Delimiter, usize, Vec<tabulon_types::ColumnType>), usize> =
        HashMap::new();

    for analysis in results {
        for block in analysis.blocks {
            let key = (
                block.signature.delimiter,
                block.signature.column_count,
                block.signature.column_types.clone(),
            );
            let schema_idx = *group_of.entry(key).or_insert_with(|| {
                let idx = doc.schemas.len();
                let columns = (0..block.signature.column_count)
                    .map(|i| DiscoveredColumn {
                        index: i,
                        name: block.signature.header_sample.get(i).cloned(),
                    })
                    .collect();
                doc.schemas.push(SchemaDefinition {
                    schema_id: SchemaId::from(format!("schema-{idx:04}")),
                    columns,
                    blocks_by_file: BTreeMap::new(),
                    confidence: 1.0,
                    canonical_schema_id: None,
                    canonical_schema_version: None,
                });
                idx
            });

            let block_idx = doc.blocks.len();
            let file_path = block.file_path.clone();
            doc.blocks.push(block);
            doc.schemas[schema_idx]
                .blocks_by_file
                .entry(file_path)
                .or_default()
                .push(block_idx);
        }
    }

    doc
}

// --- benchmark ---------------------------------------------------------------

pub fn execute_benchmark(input: &Path, profile_name: &str, log: &Path) -> Result<()> {
    let profile = Profile::resolve(profile_name)?;
    profile.validate()?;

    let files = discover_files(input)?;
    if files.is_empty() {
        bail!("no .csv/.tsv/.txt files found under {input:?}");
    }

    let job_id = JobId::from(format!("benchmark-{}", chrono::Utc::now().timestamp_millis()));
    let cancel = CancellationToken::new();
    let started = std::time::Instant::now();

    let results = analyze_files(&job_id, &files, &profile, &cancel, |p| {
        let _ = append_jsonl(log, &p);
    })
    .map_err(anyhow::Error::from)?;

    let total_rows: u64 = results
        .iter()
        .flat_map(|r| r.blocks.iter())
        .map(|b| b.end_line.saturating_sub(b.start_line))
        .sum();
    let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);

    append_jsonl(
        log,
        &serde_json::json!({
            "job_id": job_id.to_string(),
            "files": files.len(),
            "total_rows_sampled": total_rows,
            "elapsed_secs": elapsed,
            "rows_per_sec": total_rows as f64 / elapsed,
        }),
    )?;

    info!(files = files.len(), rows = total_rows, "benchmark complete");
    Ok(())
}

// --- review ------------------------------------------------------------------

pub fn execute_review(mapping: &Path, synonyms: Option<&Path>, store_path: &Path, out_dir: &Path) -> Result<()> {
    let mut doc: MappingDocument = read_json(mapping)?;
    let store = Store::open(store_path)?;

    let synonym_map = load_synonyms(synonyms)?;

    let mut candidates = Vec::new();
    for schema in &doc.schemas {
        for (file_path, block_indices) in &schema.blocks_by_file {
            let Some(&first_block_idx) = block_indices.first() else { continue };
            let block = &doc.blocks[first_block_idx];
            for (col_idx, profile) in block.column_profiles.iter().enumerate() {
                let raw_name = block
                    .signature
                    .header_sample
                    .get(col_idx)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{col_idx}"));
                candidates.push(HeaderCandidate {
                    file_path: file_path.clone(),
                    column_index: col_idx,
                    raw_name,
                    dominant_type: profile.type_hist.dominant(),
                });
            }
        }
    }

    let previous_clusters: Option<HeaderClusterDocument> = {
        let path = out_dir.join("mapping.header_clusters.json");
        if path.exists() {
            read_json(&path).ok()
        } else {
            None
        }
    };

    let next_version = doc.artifact_version + 1;
    let mut cluster_doc = build_clusters(&candidates, next_version, previous_clusters.as_ref());

    for cluster in &mut cluster_doc.clusters {
        if let Some(canonical) = synonym_map.get(&cluster.canonical_name) {
            cluster.canonical_name = canonical.clone();
        }
        for member in &cluster.members {
            if let Some(canonical) = synonym_map.get(&member.raw_name) {
                store.record_synonym(&member.raw_name, canonical)?;
            }
        }
    }

    rename_schema_columns_from_clusters(&mut doc, &cluster_doc);
    doc.artifact_version = next_version;

    store.save_header_cluster_document(&cluster_doc)?;
    for cluster in cluster_doc.clusters.iter().filter(|c| c.needs_review) {
        store.append_audit_log(None, &format!("cluster {} flagged for review: {:?}", cluster.cluster_id, cluster.reason_codes))?;
    }

    fs::create_dir_all(out_dir)?;
    write_json(&out_dir.join("mapping.header_clusters.json"), &cluster_doc)?;
    write_json(&out_dir.join("mapping.review.json"), &doc)?;

    let needs_review = cluster_doc.clusters.iter().filter(|c| c.needs_review).count();
    info!(clusters = cluster_doc.clusters.len(), needs_review, "review complete");
    Ok(())
}

fn load_synonyms(path: Option<&Path>) -> Result<HashMap<String, String>> {
    let Some(path) = path else { return Ok(HashMap::new()) };
    let text = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((raw, canonical)) = line.split_once('=') {
            map.insert(raw.trim().to_string(), canonical.trim().to_string());
        }
    }
    Ok(map)
}

fn rename_schema_columns_from_clusters(doc: &mut MappingDocument, clusters: &HeaderClusterDocument) {
    let mut canonical_by_member: HashMap<(String, usize), String> = HashMap::new();
    for cluster in &clusters.clusters {
        for member in &cluster.members {
            canonical_by_member.insert((member.file_path.clone(), member.column_index), cluster.canonical_name.clone());
        }
    }

    for schema in &mut doc.schemas {
        let Some((file_path, block_indices)) = schema.blocks_by_file.iter().next() else { continue };
        let Some(&first_block_idx) = block_indices.first() else { continue };
        let file_path = file_path.clone();
        for column in &mut schema.columns {
            if let Some(canonical) = canonical_by_member.get(&(file_path.clone(), column.index)) {
                column.name = Some(canonical.clone());
            }
        }
        let _ = first_block_idx;
    }
}

// --- normalize -----------------------------------------------------------------

pub fn execute_normalize(
    mapping: &Path,
    header_clusters: Option<&Path>,
    canonical_schema: Option<&Path>,
    out_dir: &Path,
) -> Result<()> {
    let mut doc: MappingDocument = read_json(mapping)?;
    let clusters: HeaderClusterDocument = match header_clusters {
        Some(path) => read_json(path)?,
        None => HeaderClusterDocument { artifact_version: 0, clusters: Vec::new() },
    };
    let canonical: Option<CanonicalSchema> = match canonical_schema {
        Some(path) => Some(read_json(path)?),
        None => None,
    };

    let mut new_mappings = Vec::new();
    for schema in &doc.schemas {
        // A representative block stands in for "what this canonical column
        // usually looks like" when matching unmatched columns by profile
        // distance in `detect_offsets`'s fallback pass.
        let reference_block_idx = schema.blocks_by_file.values().filter_map(|v| v.first()).next().copied();
        let target_profiles: Vec<Option<tabulon_types::ColumnProfile>> = match reference_block_idx {
            Some(idx) => (0..schema.columns.len())
                .map(|i| doc.blocks[idx].column_profiles.get(i).cloned())
                .collect(),
            None => vec![None; schema.columns.len()],
        };

        for (file_path, block_indices) in &schema.blocks_by_file {
            let Some(&first_block_idx) = block_indices.first() else { continue };
            let source_block = &doc.blocks[first_block_idx];
            let source_column_count = source_block.signature.column_count;
            let offsets = detect_offsets(
                file_path,
                source_column_count,
                &schema.columns,
                &clusters,
                &target_profiles,
                &source_block.column_profiles,
            );
            let bindings = bindings_from_offsets(&offsets);
            new_mappings.push(SchemaMapping {
                schema_id: schema.schema_id.clone(),
                file_path: file_path.clone(),
                bindings,
            });
        }
    }
    doc.schema_mapping = new_mappings;

    if let Some(canonical) = &canonical {
        for schema in &mut doc.schemas {
            schema.canonical_schema_id = Some(canonical.id.clone());
            schema.canonical_schema_version = Some(canonical.version);
        }
    }

    fs::create_dir_all(out_dir)?;
    write_json(&out_dir.join("mapping.normalized.json"), &doc)?;

    info!(schema_mappings = doc.schema_mapping.len(), "normalize complete");
    Ok(())
}

fn bindings_from_offsets(offsets: &OffsetMap) -> Vec<ColumnBinding> {
    offsets
        .target_to_source
        .iter()
        .zip(offsets.confidences.iter())
        .enumerate()
        .map(|(canonical_index, (source_index, confidence))| ColumnBinding {
            source_index: *source_index,
            canonical_index,
            confidence: *confidence,
        })
        .collect()
}

// --- materialize / resume -----------------------------------------------------

pub struct MaterializeArgs {
    pub mapping: PathBuf,
    pub dest: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub writer_format: WriterFormat,
    pub spill_threshold: Option<u64>,
    pub telemetry_log: Option<PathBuf>,
    pub db_url: Option<String>,
    pub profile: String,
    pub store: Option<PathBuf>,
    pub canonical_schema: Option<PathBuf>,
    pub job_id: String,
    pub resume: bool,
}

impl MaterializeArgs {
    fn to_metadata(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("mapping".to_string(), self.mapping.to_string_lossy().into_owned());
        m.insert("dest".to_string(), self.dest.to_string_lossy().into_owned());
        m.insert("checkpoint_dir".to_string(), self.checkpoint_dir.to_string_lossy().into_owned());
        m.insert("writer_format".to_string(), writer_format_to_str(self.writer_format).to_string());
        if let Some(n) = self.spill_threshold {
            m.insert("spill_threshold".to_string(), n.to_string());
        }
        if let Some(p) = &self.telemetry_log {
            m.insert("telemetry_log".to_string(), p.to_string_lossy().into_owned());
        }
        if let Some(url) = &self.db_url {
            m.insert("db_url".to_string(), url.clone());
        }
        m.insert("profile".to_string(), self.profile.clone());
        if let Some(store) = &self.store {
            m.insert("store".to_string(), store.to_string_lossy().into_owned());
        }
        if let Some(canonical_schema) = &self.canonical_schema {
            m.insert("canonical_schema".to_string(), canonical_schema.to_string_lossy().into_owned());
        }
        m
    }

    fn from_metadata(job_id: &str, m: &BTreeMap<String, String>) -> Result<Self> {
        let get = |k: &str| m.get(k).cloned().ok_or_else(|| anyhow::anyhow!("job metadata missing `{k}`"));
        Ok(Self {
            mapping: PathBuf::from(get("mapping")?),
            dest: PathBuf::from(get("dest")?),
            checkpoint_dir: PathBuf::from(get("checkpoint_dir")?),
            writer_format: writer_format_from_str(&get("writer_format")?)?,
            spill_threshold: m.get("spill_threshold").and_then(|s| s.parse().ok()),
            telemetry_log: m.get("telemetry_log").map(PathBuf::from),
            db_url: m.get("db_url").cloned(),
            profile: get("profile")?,
            store: m.get("store").map(PathBuf::from),
            canonical_schema: m.get("canonical_schema").map(PathBuf::from),
            job_id: job_id.to_string(),
            resume: true,
        })
    }
}

fn writer_format_to_str(f: WriterFormat) -> &'static str {
    match f {
        WriterFormat::Csv => "csv",
        WriterFormat::Parquet => "parquet",
        WriterFormat::Database => "database",
    }
}

fn writer_format_from_str(s: &str) -> Result<WriterFormat> {
    Ok(match s {
        "csv" => WriterFormat::Csv,
        "parquet" => WriterFormat::Parquet,
        "database" => WriterFormat::Database,
        other => bail!("unknown writer format in job metadata: {other}"),
    })
}

pub fn execute_materialize(args: MaterializeArgs) -> Result<()> {
    let doc: MappingDocument = read_json(&args.mapping)?;

    let mut profile = Profile::resolve(&args.profile)?;
    profile.validate()?;
    if let Some(threshold) = args.spill_threshold {
        profile.resource_limits.spill_mb = (threshold / 1000).max(1);
    }

    let job_id = JobId::from(args.job_id.clone());
    let checkpoints = CheckpointRegistry::new(args.checkpoint_dir.clone());

    let store = match &args.store {
        Some(path) => Some(Store::open(path)?),
        None => None,
    };
    if let Some(store) = &store {
        let mut status = JobStatus::new(job_id.clone(), chrono::Utc::now());
        status.state = JobState::Materializing;
        status.metadata = args.to_metadata();
        store.upsert_job_status(&status)?;
        store.record_job_event(&JobEvent {
            job_id: job_id.clone(),
            state: JobState::Materializing,
            detail: Some(format!("resume={}", args.resume)),
            at: chrono::Utc::now(),
        })?;
    }

    let canonical_schema: Option<CanonicalSchema> = match &args.canonical_schema {
        Some(path) => Some(read_json(path)?),
        None => None,
    };
    let specs = build_materialize_specs(&doc, &args, canonical_schema.as_ref())?;

    let result = materialize_all(&job_id, &specs, &profile, &checkpoints, &|| false);

    match &result {
        Ok(metrics) => {
            if let Some(log_path) = &args.telemetry_log {
                for m in metrics {
                    append_jsonl(log_path, m)?;
                }
            }
            if let Some(store) = &store {
                for m in metrics {
                    store.save_job_metrics(m)?;
                }
                let mut status = JobStatus::new(job_id.clone(), chrono::Utc::now());
                status.state = JobState::Done;
                status.metadata = args.to_metadata();
                store.upsert_job_status(&status)?;
                store.record_job_event(&JobEvent {
                    job_id: job_id.clone(),
                    state: JobState::Done,
                    detail: None,
                    at: chrono::Utc::now(),
                })?;
            }
            info!(job_id = %job_id, schemas = metrics.len(), "materialize complete");
        }
        Err(e) => {
            if let Some(store) = &store {
                let mut status = JobStatus::new(job_id.clone(), chrono::Utc::now());
                status.state = if matches!(e, TabulonError::UserAbort) { JobState::Cancelled } else { JobState::Failed };
                status.last_error = Some(e.to_string());
                status.metadata = args.to_metadata();
                store.upsert_job_status(&status)?;
            }
        }
    }

    result.map(|_| ()).map_err(anyhow::Error::from)
}

fn build_materialize_specs(
    doc: &MappingDocument,
    args: &MaterializeArgs,
    canonical_schema: Option<&CanonicalSchema>,
) -> Result<Vec<SchemaMaterializeSpec>> {
    let output_format = match args.writer_format {
        WriterFormat::Csv => OutputFormat::DelimitedText { delimiter: b',' },
        WriterFormat::Parquet => OutputFormat::Columnar,
        WriterFormat::Database => OutputFormat::EmbeddedSql,
    };

    let mut specs = Vec::with_capacity(doc.schemas.len());
    for schema in &doc.schemas {
        let mut source_files = Vec::new();
        let mut has_header_by_file = HashMap::new();
        for (file_path, block_indices) in &schema.blocks_by_file {
            let Some(&first_block_idx) = block_indices.first() else { continue };
            let block: &FileBlock = &doc.blocks[first_block_idx];
            source_files.push((file_path.clone(), block.signature.delimiter.as_byte()));
            has_header_by_file.insert(file_path.clone(), !block.signature.header_sample.is_empty());
        }

        let mut offsets_by_file: HashMap<String, OffsetMap> = HashMap::new();
        for sm in doc.schema_mapping.iter().filter(|sm| sm.schema_id == schema.schema_id) {
            let by_canonical_index: BTreeMap<usize, (Option<usize>, f64)> = sm
                .bindings
                .iter()
                .map(|b| (b.canonical_index, (b.source_index, b.confidence)))
                .collect();
            let target_to_source = by_canonical_index.values().map(|(source_index, _)| *source_index).collect();
            let confidences = by_canonical_index.values().map(|(_, confidence)| *confidence).collect();
            offsets_by_file.insert(sm.file_path.clone(), OffsetMap { target_to_source, confidences });
        }

        let canonical_columns = schema
            .columns
            .iter()
            .map(|c| c.name.clone().unwrap_or_else(|| format!("column_{}", c.index)))
            .collect();

        let destination = match args.writer_format {
            WriterFormat::Database => {
                PathBuf::from(args.db_url.clone().unwrap_or_else(|| args.dest.to_string_lossy().into_owned()))
            }
            WriterFormat::Csv => args.dest.join(format!("{}.csv", schema.schema_id)),
            WriterFormat::Parquet => args.dest.join(format!("{}.parquet", schema.schema_id)),
        };

        // Only bind the contract onto schemas that were actually normalized
        // against it; a schema `normalize` left unbound is written through
        // without validation.
        let bound_schema = canonical_schema.filter(|c| {
            schema.canonical_schema_id.as_deref() == Some(c.id.as_str())
                && schema.canonical_schema_version == Some(c.version)
        });

        specs.push(SchemaMaterializeSpec {
            schema_id: schema.schema_id.clone(),
            source_files,
            canonical_columns,
            offsets_by_file,
            has_header_by_file,
            canonical_schema: bound_schema.cloned(),
            destination,
            output_format,
        });
    }
    Ok(specs)
}

// --- status / resume -----------------------------------------------------------

pub fn execute_status(job_id: &str, store_path: &Path, as_json: bool) -> Result<()> {
    let store = Store::open(store_path)?;
    let status = store
        .get_job_status(&JobId::from(job_id))?
        .ok_or_else(|| anyhow::anyhow!("no status recorded for job `{job_id}`"))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("job:    {}", status.job_id);
        println!("state:  {:?}", status.state);
        if let Some(detail) = &status.detail {
            println!("detail: {detail}");
        }
        if let Some(err) = &status.last_error {
            println!("error:  {err}");
        }
    }
    Ok(())
}

pub fn execute_resume(job_id: &str, store_path: &Path) -> Result<()> {
    let store = Store::open(store_path)?;
    let status = store
        .get_job_status(&JobId::from(job_id))?
        .ok_or_else(|| anyhow::anyhow!("no status recorded for job `{job_id}`"))?;

    if status.state.is_terminal() {
        bail!("job `{job_id}` is already in terminal state {:?}, nothing to resume", status.state);
    }
    if status.state != JobState::Materializing {
        bail!(
            "resume only re-enters the materialize phase; job `{job_id}` is in {:?}",
            status.state
        );
    }

    let mut args = MaterializeArgs::from_metadata(job_id, &status.metadata)?;
    args.store = Some(store_path.to_path_buf());
    execute_materialize(args)
}
