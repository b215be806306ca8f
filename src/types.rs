//! Core record types, candidate validation, and run summaries

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bounds for candidate field lengths, matching the structured-output schema
/// the provider is prompted with.
const NAME_LEN: std::ops::RangeInclusive<usize> = 3..=80;
const DESCRIPTION_LEN: std::ops::RangeInclusive<usize> = 20..=1200;
const IMAGE_PROMPT_LEN: std::ops::RangeInclusive<usize> = 30..=260;

/// Required case-insensitive prefixes for a candidate's image prompt
const IMAGE_PROMPT_PREFIXES: [&str; 2] = [
    "photorealistic lego-style mini",
    "photorealistic lego-style figure",
];

/// Brand/franchise tokens that must not appear in an image prompt
const FORBIDDEN_PROMPT_TOKENS: [&str; 7] = [
    "logo",
    "official",
    "star wars",
    "marvel",
    "dc comics",
    "harry potter",
    "ninjago",
];

/// A candidate item as returned by the batch producer, before an id and
/// artifact filename are assigned.
///
/// Candidates are untrusted: the producer may emit duplicates, unknown
/// categories, or out-of-bounds fields. [`CandidateRecord::validate`] is the
/// single gate they pass before acceptance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    /// Display name; its lower-cased form is the catalog-wide dedup key
    pub name: String,
    /// Neutral 2-4 sentence description
    pub description: String,
    /// Category name; must match one of the generated categories
    pub category: String,
    /// Prompt handed to the image endpoint verbatim
    pub image_prompt: String,
}

impl CandidateRecord {
    /// Check schema/content constraints.
    ///
    /// Returns the human-readable rejection reason; callers drop (and count)
    /// rejected candidates rather than aborting the batch.
    pub fn validate(&self, categories: &[String]) -> std::result::Result<(), String> {
        if !NAME_LEN.contains(&self.name.chars().count()) {
            return Err(format!("name length out of bounds: {:?}", self.name));
        }
        if !DESCRIPTION_LEN.contains(&self.description.chars().count()) {
            return Err(format!("description length out of bounds for {:?}", self.name));
        }
        if !IMAGE_PROMPT_LEN.contains(&self.image_prompt.chars().count()) {
            return Err(format!("image prompt length out of bounds for {:?}", self.name));
        }
        let prompt = self.image_prompt.to_lowercase();
        if !IMAGE_PROMPT_PREFIXES.iter().any(|p| prompt.starts_with(p)) {
            return Err(format!("image prompt missing required prefix for {:?}", self.name));
        }
        if let Some(token) = FORBIDDEN_PROMPT_TOKENS.iter().find(|t| prompt.contains(*t)) {
            return Err(format!(
                "image prompt contains forbidden token {token:?} for {:?}",
                self.name
            ));
        }
        if !categories.iter().any(|c| c == &self.category) {
            return Err(format!(
                "unknown category {:?} for {:?}",
                self.category, self.name
            ));
        }
        Ok(())
    }

    /// Lower-cased natural key used for deduplication
    pub fn dedup_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// A fully-formed catalog record
///
/// Serialized camelCase so the on-disk catalog matches the established
/// `catalog.json` format (`productId`, `imagePrompt`, ...).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Stable unique identifier, assigned once at acceptance
    pub product_id: Uuid,
    /// Display name; its lower-cased form is the catalog-wide dedup key
    pub name: String,
    /// Neutral description
    pub description: String,
    /// Category name
    pub category: String,
    /// Artifact filename, always derived from `product_id`
    pub filename: String,
    /// Prompt handed to the image endpoint
    #[serde(default)]
    pub image_prompt: String,
}

impl Record {
    /// Promote an accepted candidate: assign a fresh id and the derived
    /// artifact filename.
    pub fn from_candidate(candidate: CandidateRecord) -> Self {
        let product_id = Uuid::new_v4();
        Self {
            product_id,
            filename: format!("{product_id}.png"),
            name: candidate.name,
            description: candidate.description,
            category: candidate.category,
            image_prompt: candidate.image_prompt,
        }
    }

    /// Lower-cased natural key used for deduplication
    pub fn dedup_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Terminal outcome of a single record's artifact fetch task
#[derive(Debug)]
pub enum FetchOutcome {
    /// Artifact was fetched and atomically written
    Success,
    /// Artifact already existed and `force` was off; no network call made
    Skipped,
    /// All attempts exhausted (or a non-retryable failure); nothing written
    Failed(crate::error::Error),
}

/// A record whose artifact fetch failed, with the terminal error
#[derive(Debug)]
pub struct FailedFetch {
    /// Id of the record left without an artifact
    pub product_id: Uuid,
    /// Record name, for operator-facing reporting
    pub name: String,
    /// The terminal error after retries were exhausted
    pub error: crate::error::Error,
}

/// Aggregate result of the artifact phase
///
/// Built by merging per-record outcomes; the merge is commutative, so task
/// completion order does not matter.
#[derive(Debug, Default)]
pub struct AggregateReport {
    /// Artifacts fetched and written this run
    pub succeeded: usize,
    /// Artifacts already present (idempotent skips)
    pub skipped: usize,
    /// Records left without an artifact, with their terminal errors
    pub failed: Vec<FailedFetch>,
}

impl AggregateReport {
    /// Fold one record's outcome into the report
    pub fn record(&mut self, product_id: Uuid, name: String, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Success => self.succeeded += 1,
            FetchOutcome::Skipped => self.skipped += 1,
            FetchOutcome::Failed(error) => self.failed.push(FailedFetch {
                product_id,
                name,
                error,
            }),
        }
    }

    /// Total outcomes collected
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed.len()
    }
}

/// Result of the accumulation phase
#[derive(Debug, Default)]
pub struct AccumulateSummary {
    /// Records in the final catalog
    pub total_records: usize,
    /// Records accepted this run (excludes those loaded on resume)
    pub accepted: usize,
    /// Candidates dropped because their dedup key was already taken
    pub rejected_duplicates: usize,
    /// Candidates dropped by schema/content validation
    pub rejected_invalid: usize,
    /// Records removed by the deterministic overshoot trim
    pub trimmed: usize,
    /// Producer batches requested
    pub batches: usize,
    /// True when accumulation stopped early without reaching the target
    pub stalled: bool,
}

/// Combined result of a full pipeline run
#[derive(Debug)]
pub struct PipelineSummary {
    /// Accumulation phase result
    pub accumulate: AccumulateSummary,
    /// Artifact phase result; `None` on dry runs
    pub artifacts: Option<AggregateReport>,
}
