//! Thin CLI over the catalog-forge library.

use catalog_forge::{Config, JsonCatalogStore, PipelineOptions, PipelineSummary, run_pipeline};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "catalog-forge", version, about = "Catalog generation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Accumulate catalog records and fetch their artifacts
    Generate {
        /// Override the configured target record count
        #[arg(long)]
        target_count: Option<usize>,

        /// Override the configured producer batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Regenerate the category list even if one is persisted
        #[arg(long)]
        force_categories: bool,

        /// Refetch artifacts that already exist
        #[arg(long)]
        force_artifacts: bool,

        /// Seed accumulation from the persisted catalog
        #[arg(long)]
        resume: bool,

        /// Run the accumulation phase only, skipping artifacts
        #[arg(long)]
        dry_run: bool,
    },
    /// Report catalog records whose artifacts are missing
    Audit {
        /// Rewrite the catalog without missing-artifact records
        /// (writes a one-time backup first)
        #[arg(long)]
        prune: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Generate {
            target_count,
            batch_size,
            force_categories,
            force_artifacts,
            resume,
            dry_run,
        } => {
            let mut config = match Config::from_env() {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(error = %e, "invalid configuration");
                    return ExitCode::FAILURE;
                }
            };
            if let Some(target_count) = target_count {
                config.generation.target_count = target_count;
            }
            if let Some(batch_size) = batch_size {
                config.generation.batch_size = batch_size;
            }
            config.dry_run = config.dry_run || dry_run;

            let options = PipelineOptions {
                force_categories,
                force_artifacts,
                resume,
            };
            generate(&config, &options).await
        }
        Command::Audit { prune } => audit(prune),
    }
}

async fn generate(config: &Config, options: &PipelineOptions) -> ExitCode {
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received: finishing in-flight fetches, admitting no more");
            signal_token.cancel();
        }
    });

    match run_pipeline(config, options, cancel).await {
        Ok(summary) => {
            report(&summary);
            // Failed artifacts are reported but non-fatal; the next resumed
            // run retries them.
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "pipeline run failed");
            ExitCode::FAILURE
        }
    }
}

fn report(summary: &PipelineSummary) {
    let accumulate = &summary.accumulate;
    tracing::info!(
        records = accumulate.total_records,
        accepted = accumulate.accepted,
        rejected_duplicates = accumulate.rejected_duplicates,
        rejected_invalid = accumulate.rejected_invalid,
        trimmed = accumulate.trimmed,
        stalled = accumulate.stalled,
        "accumulation summary"
    );
    match &summary.artifacts {
        Some(report) => {
            tracing::info!(
                succeeded = report.succeeded,
                skipped = report.skipped,
                failed = report.failed.len(),
                "artifact summary"
            );
            for failure in &report.failed {
                tracing::warn!(
                    id = %failure.product_id,
                    name = %failure.name,
                    error = %failure.error,
                    "artifact missing after run"
                );
            }
        }
        None => tracing::info!("artifact phase skipped (dry run)"),
    }
}

fn audit(do_prune: bool) -> ExitCode {
    let output_dir = std::env::var("OUTPUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data_seed"));
    let store = JsonCatalogStore::new(&output_dir);
    let artifacts_dir = output_dir.join("images");

    let result = if do_prune {
        catalog_forge::prune(&store, &artifacts_dir)
    } else {
        catalog_forge::audit(&store, &artifacts_dir)
    };

    match result {
        Ok(report) => {
            tracing::info!(
                records = report.total(),
                present = report.present.len(),
                missing = report.missing.len(),
                "artifact audit"
            );
            for record in &report.missing {
                tracing::info!(
                    filename = %record.filename,
                    id = %record.product_id,
                    "artifact missing"
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "audit failed");
            ExitCode::FAILURE
        }
    }
}
