//! Batch producer boundary: structured candidate generation
//!
//! [`BatchProducer`] is the external-collaborator contract the accumulation
//! loop depends on. The producer is untrusted: it may under-deliver, return
//! nothing (exhaustion), or emit duplicate/invalid candidates; filtering is
//! the driver's job. A producer failure surfaces as a single `Err`, never as
//! partial results, and is not retried here.
//!
//! [`OpenAiBatchProducer`] implements the contract over the provider client;
//! category bootstrap lives here as well since it shares the prompts'
//! structured-output machinery.

use crate::error::{ProviderError, Result};
use crate::provider::ProviderClient;
use crate::store;
use crate::types::CandidateRecord;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Source of candidate record batches
#[async_trait]
pub trait BatchProducer: Send + Sync {
    /// Produce up to `desired` new candidates.
    ///
    /// `existing_keys` carries the lower-cased dedup keys already taken, as
    /// a hint for the producer to steer away from; the caller still filters
    /// the result. An empty return signals exhaustion.
    async fn produce_batch(
        &self,
        existing_keys: &HashSet<String>,
        desired: usize,
    ) -> Result<Vec<CandidateRecord>>;
}

#[derive(Debug, Deserialize)]
struct ItemsEnvelope {
    #[serde(default)]
    items: Vec<CandidateRecord>,
}

#[derive(Debug, Deserialize)]
struct CategoriesEnvelope {
    #[serde(default)]
    categories: Vec<CategoryObject>,
}

#[derive(Debug, Deserialize)]
struct CategoryObject {
    name: String,
    #[allow(dead_code)]
    #[serde(default)]
    slug: String,
}

/// LLM-backed batch producer over the OpenAI-compatible provider
pub struct OpenAiBatchProducer {
    client: Arc<ProviderClient>,
    categories: Vec<String>,
}

impl OpenAiBatchProducer {
    /// Create a producer that generates items constrained to `categories`
    pub fn new(client: Arc<ProviderClient>, categories: Vec<String>) -> Self {
        Self { client, categories }
    }

    /// The category names this producer constrains items to
    pub fn categories(&self) -> &[String] {
        &self.categories
    }
}

#[async_trait]
impl BatchProducer for OpenAiBatchProducer {
    async fn produce_batch(
        &self,
        existing_keys: &HashSet<String>,
        desired: usize,
    ) -> Result<Vec<CandidateRecord>> {
        let user = batch_user_prompt(&self.categories, existing_keys, desired);
        let envelope: ItemsEnvelope = self
            .client
            .complete_json(BATCH_SYSTEM_PROMPT, &user)
            .await?;
        tracing::debug!(raw = envelope.items.len(), desired, "producer batch received");
        Ok(envelope.items)
    }
}

const BATCH_SYSTEM_PROMPT: &str = "You generate unique Lego-style catalog items. Return a JSON \
     object with key 'items'. Rules: each item has name (<=6 words), description (2-4 neutral \
     sentences, no trademarks), category (must match one of the provided categories), and \
     imagePrompt starting EXACTLY with 'Photorealistic LEGO-style minifigure' or 'Photorealistic \
     LEGO-style figure' followed by concise visual descriptors and 'clean background, high \
     detail, vibrant, evenly lit, 1024x1024'. Avoid brand/franchise names, logos, real people.";

fn batch_user_prompt(
    categories: &[String],
    existing_keys: &HashSet<String>,
    desired: usize,
) -> String {
    // Sorted so the prompt is deterministic for a given key set
    let mut used: Vec<&str> = existing_keys.iter().map(String::as_str).collect();
    used.sort_unstable();
    let used = if used.is_empty() {
        "NONE".to_string()
    } else {
        used.join(", ")
    };
    format!(
        "Existing categories: {}\nAlready used names: {}\nGenerate {} new distinct items.",
        serde_json::to_string(categories).unwrap_or_default(),
        used,
        desired,
    )
}

const CATEGORY_SYSTEM_PROMPT: &str = "You are a data generator producing a JSON object with key \
     'categories' containing category objects for a Lego-style figure catalog. Each object must \
     have name (2-3 words) and slug (kebab-case).";

/// Return the category list, generating and persisting it on first use.
///
/// An existing `categories.json` is reused unless `force` is set, so repeated
/// runs keep a stable category vocabulary.
///
/// # Errors
///
/// Fails on provider errors, on a generated list that is not exactly `count`
/// case-insensitively distinct names, or on persistence failures.
pub async fn ensure_categories(
    client: &ProviderClient,
    output_dir: &Path,
    count: usize,
    force: bool,
) -> Result<Vec<String>> {
    if !force {
        if let Some(names) = store::load_categories(output_dir)? {
            tracing::info!(count = names.len(), "using existing categories");
            return Ok(names);
        }
    }

    let user = format!("Generate exactly {count} distinct categories now.");
    let envelope: CategoriesEnvelope =
        client.complete_json(CATEGORY_SYSTEM_PROMPT, &user).await?;
    let names: Vec<String> = envelope.categories.into_iter().map(|c| c.name).collect();
    validate_categories(&names, count)?;

    store::save_categories(output_dir, &names)?;
    tracing::info!(count = names.len(), "categories generated");
    Ok(names)
}

fn validate_categories(names: &[String], count: usize) -> Result<()> {
    if names.len() != count {
        return Err(ProviderError::MalformedResponse(format!(
            "expected exactly {count} categories, got {}",
            names.len()
        ))
        .into());
    }
    let distinct: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
    if distinct.len() != names.len() {
        return Err(
            ProviderError::MalformedResponse("duplicate category names detected".into()).into(),
        );
    }
    Ok(())
}
