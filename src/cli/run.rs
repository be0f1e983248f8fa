//! CLI entry point and dispatch.
//!
//! `run()` parses arguments, configures tracing, dispatches to the matching
//! `execute_*` handler, and maps the outcome to a process exit code. Callers
//! only need `std::process::exit` on `Err`.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tabulon_error::TabulonError;

use super::args::{Cli, Commands, LogFormat};
use super::commands::{self, MaterializeArgs};

pub fn run() -> Result<(), i32> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose);

    let outcome = match cli.command {
        Commands::Analyze { input, profile, progress_log, store, out_dir, job_id } => {
            commands::execute_analyze(&input, &profile, progress_log.as_deref(), &store, &out_dir, job_id)
        }
        Commands::Benchmark { input, profile, log } => commands::execute_benchmark(&input, &profile, &log),
        Commands::Review { mapping, synonyms, store, out_dir } => {
            commands::execute_review(&mapping, synonyms.as_deref(), &store, &out_dir)
        }
        Commands::Normalize { mapping, header_clusters, canonical_schema, out_dir } => {
            commands::execute_normalize(&mapping, header_clusters.as_deref(), canonical_schema.as_deref(), &out_dir)
        }
        Commands::Materialize {
            mapping,
            dest,
            checkpoint_dir,
            writer_format,
            spill_threshold,
            telemetry_log,
            db_url,
            profile,
            store,
            canonical_schema,
            job_id,
            resume,
        } => commands::execute_materialize(MaterializeArgs {
            mapping,
            dest,
            checkpoint_dir,
            writer_format,
            spill_threshold,
            telemetry_log,
            db_url,
            profile,
            store,
            canonical_schema,
            job_id,
            resume,
        }),
        Commands::Status { job_id, store, json } => commands::execute_status(&job_id, &store, json),
        Commands::Resume { job_id, store } => commands::execute_resume(&job_id, &store),
    };

    outcome.map_err(|err| {
        eprintln!("error: {err:?}");
        exit_code_for(&err)
    })
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<TabulonError>() {
        Some(tabulon_err) => tabulon_err.exit_code(),
        None => 1,
    }
}

fn init_tracing(format: LogFormat, verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("tabulon={default_level}")));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Compact => {
            let _ = subscriber.compact().try_init();
        }
        LogFormat::Json => {
            let _ = subscriber.json().try_init();
        }
    }
}
