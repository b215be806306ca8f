//! # catalog-forge
//!
//! Idempotent catalog generation pipeline with bounded-concurrency artifact
//! fetching.
//!
//! ## Design Philosophy
//!
//! catalog-forge is designed to be:
//! - **Resumable** - Restarting after a crash or interrupt repeats no
//!   committed work: accepted records persist after every batch and existing
//!   artifacts are skipped
//! - **Bounded** - Artifact fetches run under a fixed concurrency ceiling
//!   regardless of catalog size
//! - **Failure-isolated** - One record's failed fetch never aborts the run;
//!   failures are collected into the final report for a later retry
//! - **Library-first** - The binary is a thin CLI over the library API
//!
//! ## Quick Start
//!
//! ```no_run
//! use catalog_forge::{Config, PipelineOptions, run_pipeline};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let summary = run_pipeline(
//!         &config,
//!         &PipelineOptions::default(),
//!         CancellationToken::new(),
//!     )
//!     .await?;
//!     println!("accepted {} records", summary.accumulate.accepted);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Catalog accumulation loop
pub mod driver;
/// Error types
pub mod error;
/// Per-record artifact fetch task
pub mod fetcher;
/// Pipeline orchestration
pub mod pipeline;
/// Batch producer boundary and category bootstrap
pub mod producer;
/// OpenAI-compatible provider client
pub mod provider;
/// Missing-artifact audit and prune
pub mod prune;
/// Retry logic with exponential backoff
pub mod retry;
/// Bounded-concurrency artifact scheduler
pub mod scheduler;
/// Catalog persistence
pub mod store;
/// Core record types and run summaries
pub mod types;

// Re-export commonly used types
pub use config::{ArtifactConfig, Config, GenerationConfig, ProviderConfig, RetryConfig};
pub use driver::CatalogDriver;
pub use error::{ArtifactError, Error, ProviderError, Result};
pub use fetcher::{ArtifactFetcher, ArtifactRequest, ArtifactSource};
pub use pipeline::{PipelineOptions, run_pipeline};
pub use producer::{BatchProducer, OpenAiBatchProducer, ensure_categories};
pub use provider::ProviderClient;
pub use prune::{AuditReport, audit, prune};
pub use scheduler::FetchScheduler;
pub use store::{JsonCatalogStore, RecordStore, existing_dedup_keys};
pub use types::{
    AccumulateSummary, AggregateReport, CandidateRecord, FailedFetch, FetchOutcome,
    PipelineSummary, Record,
};
