//! Missing-artifact audit and prune
//!
//! A set-difference report over already-materialized state: which catalog
//! records have no artifact on disk. Pruning rewrites the catalog without
//! those records, after writing a one-time backup of the pre-image.

use crate::error::Result;
use crate::store::{JsonCatalogStore, RecordStore};
use crate::types::Record;
use std::path::Path;

/// Partition of the catalog by artifact presence
#[derive(Debug)]
pub struct AuditReport {
    /// Records whose artifact exists and is non-empty
    pub present: Vec<Record>,
    /// Records with no usable artifact on disk
    pub missing: Vec<Record>,
}

impl AuditReport {
    /// Total records audited
    pub fn total(&self) -> usize {
        self.present.len() + self.missing.len()
    }
}

/// Partition catalog records by whether their artifact file exists and is
/// non-empty.
///
/// # Errors
///
/// Fails when the catalog cannot be loaded.
pub fn audit(store: &JsonCatalogStore, artifacts_dir: &Path) -> Result<AuditReport> {
    let catalog = store.load()?;
    let (present, missing) = catalog.into_iter().partition(|record: &Record| {
        std::fs::metadata(artifacts_dir.join(&record.filename))
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    });
    Ok(AuditReport { present, missing })
}

/// Remove records with missing artifacts from the catalog.
///
/// A backup copy of the catalog is written before the first destructive
/// rewrite; repeated prunes keep that original backup. A catalog with
/// nothing missing is left untouched (no backup, no rewrite).
///
/// # Errors
///
/// Fails when the catalog cannot be loaded, backed up, or rewritten.
pub fn prune(store: &JsonCatalogStore, artifacts_dir: &Path) -> Result<AuditReport> {
    let report = audit(store, artifacts_dir)?;
    if report.missing.is_empty() {
        tracing::info!("no missing artifacts, nothing to prune");
        return Ok(report);
    }

    if let Some(backup) = store.backup_once()? {
        tracing::info!(backup = %backup.display(), "backup written");
    }
    store.save(&report.present)?;
    tracing::info!(
        removed = report.missing.len(),
        remaining = report.present.len(),
        "pruned catalog written"
    );
    Ok(report)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CandidateRecord;

    fn record(name: &str) -> Record {
        Record::from_candidate(CandidateRecord {
            name: name.into(),
            description: "A perfectly serviceable description of a test figure.".into(),
            category: "City Workers".into(),
            image_prompt: "Photorealistic LEGO-style minifigure for testing, clean background"
                .into(),
        })
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: JsonCatalogStore,
        artifacts_dir: std::path::PathBuf,
    }

    /// Three records, artifacts materialized for the first two only
    fn fixture() -> (Fixture, Vec<Record>) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCatalogStore::new(dir.path());
        let artifacts_dir = dir.path().join("images");
        std::fs::create_dir_all(&artifacts_dir).unwrap();

        let records = vec![record("Alpha"), record("Beta"), record("Gamma")];
        store.save(&records).unwrap();
        std::fs::write(artifacts_dir.join(&records[0].filename), b"png").unwrap();
        std::fs::write(artifacts_dir.join(&records[1].filename), b"png").unwrap();
        // Gamma's artifact is zero-length: present on disk but unusable
        std::fs::write(artifacts_dir.join(&records[2].filename), b"").unwrap();

        (
            Fixture {
                _dir: dir,
                store,
                artifacts_dir,
            },
            records,
        )
    }

    #[test]
    fn audit_partitions_by_artifact_presence() {
        let (fx, records) = fixture();
        let report = audit(&fx.store, &fx.artifacts_dir).unwrap();

        assert_eq!(report.total(), 3);
        assert_eq!(report.present.len(), 2);
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].name, records[2].name);
    }

    #[test]
    fn audit_does_not_modify_the_catalog() {
        let (fx, records) = fixture();
        audit(&fx.store, &fx.artifacts_dir).unwrap();
        assert_eq!(fx.store.load().unwrap(), records);
    }

    #[test]
    fn prune_backs_up_then_rewrites() {
        let (fx, records) = fixture();
        let report = prune(&fx.store, &fx.artifacts_dir).unwrap();

        assert_eq!(report.missing.len(), 1);
        let remaining = fx.store.load().unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|r| r.name != "Gamma"));

        // Backup holds the pre-prune catalog
        let backup = fx.store.path().with_extension("json.bak");
        let backed_up: Vec<Record> =
            serde_json::from_str(&std::fs::read_to_string(backup).unwrap()).unwrap();
        assert_eq!(backed_up, records);
    }

    #[test]
    fn repeated_prunes_keep_the_original_backup() {
        let (fx, records) = fixture();
        prune(&fx.store, &fx.artifacts_dir).unwrap();

        // Lose another artifact, prune again
        std::fs::remove_file(fx.artifacts_dir.join(&records[1].filename)).unwrap();
        prune(&fx.store, &fx.artifacts_dir).unwrap();

        assert_eq!(fx.store.load().unwrap().len(), 1);
        let backup = fx.store.path().with_extension("json.bak");
        let backed_up: Vec<Record> =
            serde_json::from_str(&std::fs::read_to_string(backup).unwrap()).unwrap();
        assert_eq!(backed_up, records, "first pre-image must survive later prunes");
    }

    #[test]
    fn prune_with_nothing_missing_writes_nothing() {
        let (fx, records) = fixture();
        std::fs::write(fx.artifacts_dir.join(&records[2].filename), b"png").unwrap();

        let report = prune(&fx.store, &fx.artifacts_dir).unwrap();
        assert!(report.missing.is_empty());
        assert!(!fx.store.path().with_extension("json.bak").exists());
        assert_eq!(fx.store.load().unwrap(), records);
    }
}
