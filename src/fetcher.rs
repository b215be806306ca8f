//! Per-record artifact fetch task
//!
//! Each record owns exactly one artifact file, so fetch tasks are safe to
//! run concurrently without locking. A fetch is idempotent: an existing
//! non-empty artifact short-circuits to [`FetchOutcome::Skipped`] with zero
//! network calls, which is what makes the artifact phase crash-resumable.

use crate::config::RetryConfig;
use crate::error::{ArtifactError, Error, Result};
use crate::provider::ProviderClient;
use crate::retry::retry_with_backoff;
use crate::types::{FetchOutcome, Record};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Request handed to the artifact network boundary
#[derive(Clone, Debug)]
pub struct ArtifactRequest {
    /// Generation prompt derived from the record payload
    pub prompt: String,
    /// Requested square edge length in pixels
    pub size: u32,
}

/// Network boundary for a single artifact fetch attempt
///
/// One call is one attempt; retry policy lives in [`ArtifactFetcher`].
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Fetch/generate the raw artifact bytes for one request
    async fn fetch(&self, request: &ArtifactRequest) -> Result<Vec<u8>>;
}

#[async_trait]
impl ArtifactSource for ProviderClient {
    async fn fetch(&self, request: &ArtifactRequest) -> Result<Vec<u8>> {
        self.generate_image(&request.prompt, request.size).await
    }
}

/// Fetches one artifact per record with retry, atomic write, and
/// skip-if-present semantics
pub struct ArtifactFetcher {
    source: Arc<dyn ArtifactSource>,
    artifacts_dir: PathBuf,
    retry: RetryConfig,
    image_size: u32,
    force: bool,
}

impl ArtifactFetcher {
    /// Create a fetcher writing into `artifacts_dir`
    pub fn new(
        source: Arc<dyn ArtifactSource>,
        artifacts_dir: PathBuf,
        retry: RetryConfig,
        image_size: u32,
        force: bool,
    ) -> Self {
        Self {
            source,
            artifacts_dir,
            retry,
            image_size,
            force,
        }
    }

    /// Fetch the artifact for one record.
    ///
    /// Terminal states only; errors are folded into
    /// [`FetchOutcome::Failed`] so one record's failure never aborts the
    /// phase. After a failure nothing is left at the final path; a future
    /// run will retry the record from scratch.
    pub async fn fetch(&self, record: &Record, cancel: &CancellationToken) -> FetchOutcome {
        let final_path = self.artifacts_dir.join(&record.filename);
        if !self.force && artifact_present(&final_path) {
            tracing::debug!(id = %record.product_id, "artifact already present, skipping");
            return FetchOutcome::Skipped;
        }

        let request = ArtifactRequest {
            prompt: record.image_prompt.clone(),
            size: self.image_size,
        };

        let attempt_result = retry_with_backoff(&self.retry, cancel, || {
            let source = Arc::clone(&self.source);
            let request = request.clone();
            async move { source.fetch(&request).await }
        })
        .await;

        let bytes = match attempt_result {
            Ok(bytes) if bytes.is_empty() => {
                return FetchOutcome::Failed(ArtifactError::MissingData.into());
            }
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(id = %record.product_id, error = %e, "artifact fetch failed");
                return FetchOutcome::Failed(e);
            }
        };

        match self.write_atomic(&final_path, &bytes) {
            Ok(()) => FetchOutcome::Success,
            Err(e) => {
                tracing::error!(id = %record.product_id, error = %e, "artifact write failed");
                FetchOutcome::Failed(e)
            }
        }
    }

    /// Write to a temp file in the target directory, then atomically replace
    /// the final path, so a concurrent reader or a crash never observes a
    /// partially written artifact.
    fn write_atomic(&self, final_path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = tempfile::NamedTempFile::new_in(&self.artifacts_dir).map_err(|source| {
            Error::Persistence {
                path: self.artifacts_dir.clone(),
                source,
            }
        })?;
        std::io::Write::write_all(&mut tmp.as_file(), bytes).map_err(|source| {
            Error::Persistence {
                path: final_path.to_path_buf(),
                source,
            }
        })?;
        tmp.persist(final_path).map_err(|e| Error::Persistence {
            path: final_path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

/// Derived artifact state: file exists and is non-empty
fn artifact_present(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::types::CandidateRecord;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Test double: scripted per-attempt results plus an attempt counter
    struct ScriptedSource {
        attempts: AtomicU32,
        script: std::sync::Mutex<VecDeque<Result<Vec<u8>>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<u8>>>) -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicU32::new(0),
                script: std::sync::Mutex::new(script.into()),
            })
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArtifactSource for ScriptedSource {
        async fn fetch(&self, _request: &ArtifactRequest) -> Result<Vec<u8>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(b"png".to_vec()))
        }
    }

    fn record() -> Record {
        Record::from_candidate(CandidateRecord {
            name: "Harbor Crane Operator".into(),
            description: "A cheerful dockside figure in a bright safety vest, ready for work."
                .into(),
            category: "City Workers".into(),
            image_prompt: "Photorealistic LEGO-style minifigure of a crane operator, clean \
                           background, high detail, vibrant, evenly lit"
                .into(),
        })
    }

    fn retryable_error() -> Error {
        ProviderError::Api {
            status: 503,
            message: "unavailable".into(),
        }
        .into()
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn fetcher(source: Arc<dyn ArtifactSource>, dir: &Path, force: bool) -> ArtifactFetcher {
        ArtifactFetcher::new(source, dir.to_path_buf(), fast_retry(3), 1024, force)
    }

    #[tokio::test]
    async fn existing_artifact_is_skipped_without_network_calls() {
        let dir = tempfile::tempdir().unwrap();
        let record = record();
        std::fs::write(dir.path().join(&record.filename), b"already here").unwrap();

        let source = ScriptedSource::new(vec![]);
        let outcome = fetcher(source.clone(), dir.path(), false)
            .fetch(&record, &CancellationToken::new())
            .await;

        assert!(matches!(outcome, FetchOutcome::Skipped));
        assert_eq!(source.attempts(), 0, "skip must make zero network calls");
    }

    #[tokio::test]
    async fn empty_existing_file_is_not_treated_as_present() {
        let dir = tempfile::tempdir().unwrap();
        let record = record();
        std::fs::write(dir.path().join(&record.filename), b"").unwrap();

        let source = ScriptedSource::new(vec![Ok(b"fresh bytes".to_vec())]);
        let outcome = fetcher(source.clone(), dir.path(), false)
            .fetch(&record, &CancellationToken::new())
            .await;

        assert!(matches!(outcome, FetchOutcome::Success));
        assert_eq!(source.attempts(), 1);
    }

    #[tokio::test]
    async fn force_refetches_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let record = record();
        std::fs::write(dir.path().join(&record.filename), b"stale").unwrap();

        let source = ScriptedSource::new(vec![Ok(b"fresh".to_vec())]);
        let outcome = fetcher(source.clone(), dir.path(), true)
            .fetch(&record, &CancellationToken::new())
            .await;

        assert!(matches!(outcome, FetchOutcome::Success));
        let written = std::fs::read(dir.path().join(&record.filename)).unwrap();
        assert_eq!(written, b"fresh");
    }

    #[tokio::test]
    async fn success_writes_artifact_and_cleans_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let record = record();

        let source = ScriptedSource::new(vec![Ok(b"png bytes".to_vec())]);
        let outcome = fetcher(source, dir.path(), false)
            .fetch(&record, &CancellationToken::new())
            .await;

        assert!(matches!(outcome, FetchOutcome::Success));
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec![record.filename.clone()]);
        assert_eq!(
            std::fs::read(dir.path().join(&record.filename)).unwrap(),
            b"png bytes"
        );
    }

    #[tokio::test]
    async fn retryable_failures_consume_budget_then_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let record = record();

        let source = ScriptedSource::new(vec![
            Err(retryable_error()),
            Err(retryable_error()),
            Ok(b"third time lucky".to_vec()),
        ]);
        let outcome = fetcher(source.clone(), dir.path(), false)
            .fetch(&record, &CancellationToken::new())
            .await;

        assert!(matches!(outcome, FetchOutcome::Success));
        assert_eq!(source.attempts(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_leave_no_file_at_final_path() {
        let dir = tempfile::tempdir().unwrap();
        let record = record();

        let source = ScriptedSource::new(vec![
            Err(retryable_error()),
            Err(retryable_error()),
            Err(retryable_error()),
        ]);
        let outcome = fetcher(source.clone(), dir.path(), false)
            .fetch(&record, &CancellationToken::new())
            .await;

        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert_eq!(source.attempts(), 3, "attempts capped at max_attempts");
        assert!(!dir.path().join(&record.filename).exists());
        // No stray temp files either
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn non_retryable_failure_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let record = record();

        let source = ScriptedSource::new(vec![Err(ArtifactError::InvalidRequest(
            "prompt rejected".into(),
        )
        .into())]);
        let outcome = fetcher(source.clone(), dir.path(), false)
            .fetch(&record, &CancellationToken::new())
            .await;

        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert_eq!(source.attempts(), 1, "invalid request must not be retried");
    }

    #[tokio::test]
    async fn failed_replace_leaves_no_artifact_and_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let record = record();
        // A directory squatting on the final path makes the atomic replace
        // fail after the temp file has been fully written.
        std::fs::create_dir(dir.path().join(&record.filename)).unwrap();

        let source = ScriptedSource::new(vec![Ok(b"png bytes".to_vec())]);
        let outcome = fetcher(source, dir.path(), true)
            .fetch(&record, &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::Failed(Error::Persistence { .. })
        ));
        assert!(
            !dir.path().join(&record.filename).is_file(),
            "no file may appear at the final path"
        );
        // The written temp file must have been cleaned up on failure
        let stray: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().unwrap().is_file())
            .collect();
        assert!(stray.is_empty(), "temp files left behind: {stray:?}");
    }

    #[tokio::test]
    async fn empty_payload_is_a_failure_not_an_empty_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let record = record();

        let source = ScriptedSource::new(vec![Ok(Vec::new())]);
        let outcome = fetcher(source, dir.path(), false)
            .fetch(&record, &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::Failed(Error::Artifact(ArtifactError::MissingData))
        ));
        assert!(!dir.path().join(&record.filename).exists());
    }
}
