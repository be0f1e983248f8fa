//! CLI argument definitions and parsing structures
//!
//! Defines the top-level `Cli` struct and the `Commands` enum for the five
//! pipeline verbs plus `status`/`resume`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// tabulon - streaming CSV/TSV schema discovery and checkpointed materialization
#[derive(Parser)]
#[command(name = "tabulon")]
#[command(about = "Discover, cluster, and materialize heterogeneous CSV/TSV sources into a canonical schema")]
#[command(long_about = r#"
tabulon samples a directory of CSV/TSV files, profiles their columns,
clusters similar headers across files, binds them to a canonical schema, and
materializes the normalized rows to CSV, Parquet, or an embedded database —
all resumable from durable checkpoints.

EXAMPLES:
  # Sample and profile every file under a directory
  tabulon analyze ./data --profile workstation --store ./tabulon.db

  # Cluster discovered headers into canonical field names
  tabulon review mapping.json --store ./tabulon.db

  # Bind per-file column offsets against the clustered schema
  tabulon normalize mapping.review.json

  # Write normalized rows out as chunked Parquet, resumable via checkpoint
  tabulon materialize mapping.normalized.json ./out --writer-format parquet \
      --checkpoint-dir ./checkpoints --job-id ingest-2026-07-26

  # Check on a running or finished job
  tabulon status ingest-2026-07-26 --store ./tabulon.db --json

  # Resume a materialize job interrupted mid-run
  tabulon resume ingest-2026-07-26 --store ./tabulon.db

PHASES:
  Analyze -> Review (cluster) -> Normalize -> Materialize -> Validate
  Each phase reads the previous phase's JSON artifact and writes its own.
"#)]
#[command(version)]
pub struct Cli {
    /// Log output shape: human-readable compact lines, or one JSON object per event.
    #[arg(long, global = true, value_enum, default_value = "compact")]
    pub log_format: LogFormat,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WriterFormat {
    Csv,
    Parquet,
    Database,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sample every file under a directory, profile its columns, and write a Mapping document.
    Analyze {
        /// Directory containing the source CSV/TSV files.
        input: PathBuf,

        /// Named profile (`low_memory`, `workstation`) or path to a profile TOML file.
        #[arg(long, default_value = "low_memory")]
        profile: String,

        /// Append-only JSONL of per-file `AnalysisProgress` events.
        #[arg(long)]
        progress_log: Option<PathBuf>,

        /// Path to the durable sqlite store.
        #[arg(long)]
        store: PathBuf,

        /// Directory to write `mapping.json` / `mapping.column_profiles.json` into.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Job id to record this run under; generated from the current time if omitted.
        #[arg(long)]
        job_id: Option<String>,
    },

    /// Re-run analysis without persisting artifacts, measuring throughput.
    Benchmark {
        input: PathBuf,

        #[arg(long, default_value = "low_memory")]
        profile: String,

        /// Append-only JSONL of throughput samples.
        #[arg(long)]
        log: PathBuf,
    },

    /// Cluster discovered headers across files into canonical field names.
    Review {
        /// `mapping.json` produced by `analyze`.
        mapping: PathBuf,

        /// Known raw-name -> canonical-name synonym pairs, one `raw=canonical` per line.
        #[arg(long)]
        synonyms: Option<PathBuf>,

        #[arg(long)]
        store: PathBuf,

        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Bind each file's raw column order onto its schema's canonical order.
    Normalize {
        /// Mapping document, ideally `mapping.review.json` from `review`.
        mapping: PathBuf,

        /// `mapping.header_clusters.json` from `review`; positional fallback is used if omitted.
        #[arg(long)]
        header_clusters: Option<PathBuf>,

        /// Canonical schema contract (JSON) to bind each schema to; validation in `materialize`
        /// only runs against schemas bound this way.
        #[arg(long)]
        canonical_schema: Option<PathBuf>,

        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Materialize normalized rows to CSV, Parquet, or an embedded database.
    Materialize {
        /// `mapping.normalized.json` from `normalize`.
        mapping: PathBuf,

        /// Destination directory (file-based writers) or database path.
        dest: PathBuf,

        #[arg(long)]
        checkpoint_dir: PathBuf,

        #[arg(long, value_enum, default_value = "csv")]
        writer_format: WriterFormat,

        /// Row count above which the spill buffer overflows to disk; overrides the profile's `spill_mb`.
        #[arg(long)]
        spill_threshold: Option<u64>,

        /// Append-only JSONL of per-schema `JobMetrics`.
        #[arg(long)]
        telemetry_log: Option<PathBuf>,

        /// Database path used only when `--writer-format database`.
        #[arg(long)]
        db_url: Option<String>,

        #[arg(long, default_value = "low_memory")]
        profile: String,

        #[arg(long)]
        store: Option<PathBuf>,

        /// Canonical schema contract (JSON) to validate rows against; schemas not bound to one
        /// at `normalize` time are written through unvalidated.
        #[arg(long)]
        canonical_schema: Option<PathBuf>,

        #[arg(long)]
        job_id: String,

        /// Re-enter a job whose checkpoint already exists.
        #[arg(long)]
        resume: bool,
    },

    /// Report a job's durable status.
    Status {
        job_id: String,

        #[arg(long)]
        store: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Resume an interrupted materialize job from its persisted status and checkpoint.
    Resume {
        job_id: String,

        #[arg(long)]
        store: PathBuf,
    },
}
