//! Catalog accumulation loop
//!
//! Strictly sequential: one producer batch at a time, the store is the only
//! shared-state writer. The catalog is persisted after every accepted batch,
//! so a crash loses at most one batch's worth of producer calls and never a
//! previously committed record.

use crate::config::GenerationConfig;
use crate::error::Result;
use crate::producer::BatchProducer;
use crate::store::{RecordStore, existing_dedup_keys};
use crate::types::{AccumulateSummary, Record};

/// Drives the accumulate/resume loop against a store and a producer
pub struct CatalogDriver<S> {
    store: S,
    target_count: usize,
    batch_size: usize,
    stall_retries: u32,
}

impl<S: RecordStore> CatalogDriver<S> {
    /// Create a driver with the given accumulation policy
    pub fn new(store: S, generation: &GenerationConfig) -> Self {
        Self {
            store,
            target_count: generation.target_count,
            batch_size: generation.batch_size,
            stall_retries: generation.stall_retries,
        }
    }

    /// Accumulate records until the target is reached or the producer stops
    /// making progress.
    ///
    /// With `resume` set, the persisted catalog seeds both the record list
    /// and the dedup key set; otherwise accumulation starts empty and the
    /// first save overwrites whatever was on disk.
    ///
    /// # Errors
    ///
    /// Persistence failures and a corrupt catalog on resume are fatal.
    /// Producer failures are not: each consumes one stall allowance
    /// (`stall_retries`), and when allowances run out the phase ends early,
    /// flagged in the summary.
    pub async fn run(
        &self,
        producer: &dyn BatchProducer,
        categories: &[String],
        resume: bool,
    ) -> Result<(Vec<Record>, AccumulateSummary)> {
        let mut records = if resume {
            let loaded = self.store.load()?;
            tracing::info!(count = loaded.len(), "resuming from existing catalog");
            loaded
        } else {
            Vec::new()
        };
        let mut keys = existing_dedup_keys(&records);
        let mut summary = AccumulateSummary::default();
        let mut stalls_remaining = self.stall_retries;

        while records.len() < self.target_count {
            // Hint only; the producer may ignore it
            let desired = self.batch_size.min(self.target_count - records.len());
            summary.batches += 1;

            let raw = match producer.produce_batch(&keys, desired).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(error = %e, "producer batch failed");
                    if !self.consume_stall(&mut stalls_remaining) {
                        summary.stalled = true;
                        break;
                    }
                    continue;
                }
            };

            if raw.is_empty() {
                tracing::warn!("producer returned an empty batch (exhaustion)");
                if !self.consume_stall(&mut stalls_remaining) {
                    summary.stalled = true;
                    break;
                }
                continue;
            }

            let mut accepted_this_batch = 0usize;
            for candidate in raw {
                let key = candidate.dedup_key();
                if keys.contains(&key) {
                    summary.rejected_duplicates += 1;
                    continue;
                }
                if let Err(reason) = candidate.validate(categories) {
                    tracing::debug!(reason = %reason, "candidate rejected");
                    summary.rejected_invalid += 1;
                    continue;
                }
                keys.insert(key);
                records.push(Record::from_candidate(candidate));
                accepted_this_batch += 1;
            }

            if accepted_this_batch == 0 {
                tracing::warn!("batch filtered down to zero accepted records");
                if !self.consume_stall(&mut stalls_remaining) {
                    summary.stalled = true;
                    break;
                }
                continue;
            }

            stalls_remaining = self.stall_retries;
            summary.accepted += accepted_this_batch;
            self.store.save(&records)?;
            tracing::info!(
                count = records.len(),
                target = self.target_count,
                "batch accepted"
            );
        }

        // Deterministic overshoot trim: earliest-accepted records are kept
        if records.len() > self.target_count {
            summary.trimmed = records.len() - self.target_count;
            records.truncate(self.target_count);
            self.store.save(&records)?;
            tracing::info!(
                trimmed = summary.trimmed,
                target = self.target_count,
                "catalog trimmed to target"
            );
        }

        summary.total_records = records.len();
        Ok((records, summary))
    }

    /// Returns false when no stall allowance is left
    fn consume_stall(&self, stalls_remaining: &mut u32) -> bool {
        if *stalls_remaining == 0 {
            return false;
        }
        *stalls_remaining -= 1;
        tracing::info!(remaining = *stalls_remaining, "retrying after stall");
        true
    }
}
