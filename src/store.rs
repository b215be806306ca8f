//! Catalog persistence: whole-file JSON store with atomic replacement
//!
//! The catalog is always serialized as a whole (single-writer, last write
//! wins). Saves go through a named temp file in the target directory
//! followed by an atomic rename, so a crash mid-write never leaves a
//! half-written catalog visible to the next run.

use crate::error::{Error, Result};
use crate::types::Record;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Storage seam for the record catalog
///
/// The pipeline only depends on this trait; [`JsonCatalogStore`] is the
/// file-backed implementation. Tests substitute counting or failing stores.
pub trait RecordStore: Send + Sync {
    /// Read the persisted catalog.
    ///
    /// Returns an empty vector when no catalog exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptCatalog`] when a catalog file exists but
    /// cannot be parsed; the caller decides whether to abort or start
    /// fresh, the store never discards data on its own.
    fn load(&self) -> Result<Vec<Record>>;

    /// Persist the full record sequence atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] when the temp write or rename fails.
    fn save(&self, records: &[Record]) -> Result<()>;
}

/// Lower-cased projection of every record's dedup key
pub fn existing_dedup_keys(records: &[Record]) -> HashSet<String> {
    records.iter().map(Record::dedup_key).collect()
}

/// File-backed catalog store (`catalog.json` under the output directory)
#[derive(Clone, Debug)]
pub struct JsonCatalogStore {
    path: PathBuf,
}

impl JsonCatalogStore {
    /// Create a store rooted at the given output directory
    pub fn new(output_dir: &Path) -> Self {
        Self {
            path: output_dir.join("catalog.json"),
        }
    }

    /// Path of the catalog file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a one-time backup copy (`catalog.json.bak`) before a
    /// destructive rewrite such as pruning.
    ///
    /// The backup is only written if none exists yet, so the first rewrite's
    /// pre-image is preserved across repeated prunes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] when the copy fails.
    pub fn backup_once(&self) -> Result<Option<PathBuf>> {
        let backup = self.path.with_extension("json.bak");
        if backup.exists() {
            return Ok(None);
        }
        if !self.path.exists() {
            return Ok(None);
        }
        std::fs::copy(&self.path, &backup).map_err(|source| Error::Persistence {
            path: backup.clone(),
            source,
        })?;
        Ok(Some(backup))
    }
}

impl RecordStore for JsonCatalogStore {
    fn load(&self) -> Result<Vec<Record>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|source| Error::CorruptCatalog {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, records: &[Record]) -> Result<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|source| Error::Persistence {
            path: parent.to_path_buf(),
            source,
        })?;

        let json = serde_json::to_vec_pretty(records)?;

        // Temp file must live in the target directory so the final rename
        // stays on one filesystem and is atomic.
        let tmp = tempfile::NamedTempFile::new_in(parent).map_err(|source| Error::Persistence {
            path: parent.to_path_buf(),
            source,
        })?;
        std::io::Write::write_all(&mut tmp.as_file(), &json).map_err(|source| {
            Error::Persistence {
                path: self.path.clone(),
                source,
            }
        })?;
        tmp.persist(&self.path).map_err(|e| Error::Persistence {
            path: self.path.clone(),
            source: e.error,
        })?;

        tracing::debug!(path = %self.path.display(), records = records.len(), "catalog saved");
        Ok(())
    }
}

/// Load the persisted category list, if present
///
/// # Errors
///
/// Returns [`Error::CorruptCatalog`] when the file exists but cannot be
/// parsed.
pub fn load_categories(output_dir: &Path) -> Result<Option<Vec<String>>> {
    let path = output_dir.join("categories.json");
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let names =
        serde_json::from_str(&raw).map_err(|source| Error::CorruptCatalog { path, source })?;
    Ok(Some(names))
}

/// Persist the category list atomically
///
/// # Errors
///
/// Returns [`Error::Persistence`] when the write fails.
pub fn save_categories(output_dir: &Path, names: &[String]) -> Result<()> {
    let path = output_dir.join("categories.json");
    std::fs::create_dir_all(output_dir).map_err(|source| Error::Persistence {
        path: output_dir.to_path_buf(),
        source,
    })?;
    let json = serde_json::to_vec_pretty(names)?;
    let tmp = tempfile::NamedTempFile::new_in(output_dir).map_err(|source| Error::Persistence {
        path: output_dir.to_path_buf(),
        source,
    })?;
    std::io::Write::write_all(&mut tmp.as_file(), &json).map_err(|source| Error::Persistence {
        path: path.clone(),
        source,
    })?;
    tmp.persist(&path).map_err(|e| Error::Persistence {
        path,
        source: e.error,
    })?;
    Ok(())
}
