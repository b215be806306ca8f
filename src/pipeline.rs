//! Pipeline orchestration: categories → accumulation → artifact phase
//!
//! Builds one provider client from configuration and threads it through
//! both phases explicitly; no ambient globals. The artifact phase is skipped
//! on dry runs, and a cancellation token stops admission of new fetches
//! while letting in-flight attempts finish.

use crate::config::Config;
use crate::driver::CatalogDriver;
use crate::error::Result;
use crate::fetcher::{ArtifactFetcher, ArtifactSource};
use crate::producer::{OpenAiBatchProducer, ensure_categories};
use crate::provider::ProviderClient;
use crate::scheduler::FetchScheduler;
use crate::store::JsonCatalogStore;
use crate::types::PipelineSummary;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-run switches that modify pipeline behavior without touching config
#[derive(Clone, Debug, Default)]
pub struct PipelineOptions {
    /// Regenerate the category list even if one is persisted
    pub force_categories: bool,
    /// Refetch artifacts that already exist
    pub force_artifacts: bool,
    /// Seed the accumulation phase from the persisted catalog
    pub resume: bool,
}

/// Run the full pipeline.
///
/// # Errors
///
/// Configuration, corrupt-state, and persistence errors abort the run.
/// Individual artifact failures do not abort; they are reported in the
/// summary.
pub async fn run_pipeline(
    config: &Config,
    options: &PipelineOptions,
    cancel: CancellationToken,
) -> Result<PipelineSummary> {
    config.validate()?;
    let client = Arc::new(ProviderClient::new(config.provider.clone())?);
    std::fs::create_dir_all(&config.artifacts.output_dir)?;

    let categories = ensure_categories(
        &client,
        &config.artifacts.output_dir,
        config.generation.category_count,
        options.force_categories,
    )
    .await?;

    let store = JsonCatalogStore::new(&config.artifacts.output_dir);
    let driver = CatalogDriver::new(store, &config.generation);
    let producer = OpenAiBatchProducer::new(Arc::clone(&client), categories.clone());
    let (records, accumulate) = driver.run(&producer, &categories, options.resume).await?;

    if config.dry_run {
        tracing::info!("dry run: skipping artifact phase");
        return Ok(PipelineSummary {
            accumulate,
            artifacts: None,
        });
    }

    let artifacts_dir = config.artifacts.artifacts_dir();
    std::fs::create_dir_all(&artifacts_dir)?;
    let source: Arc<dyn ArtifactSource> = client;
    let fetcher = Arc::new(ArtifactFetcher::new(
        source,
        artifacts_dir,
        config.retry.clone(),
        config.artifacts.image_size,
        options.force_artifacts,
    ));
    let scheduler = FetchScheduler::new(fetcher, config.artifacts.concurrency_limit, cancel);
    let artifacts = scheduler.run_all(&records).await;

    Ok(PipelineSummary {
        accumulate,
        artifacts: Some(artifacts),
    })
}
