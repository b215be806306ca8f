//! Configuration types for catalog-forge

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Provider connection configuration (endpoint, credentials, deployments)
///
/// Groups settings for the structured-generation provider. Used as a nested
/// sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the OpenAI-compatible API (no trailing slash)
    pub endpoint: String,

    /// API key sent in the `api-key` header
    pub api_key: String,

    /// Model/deployment used for structured text generation
    pub text_model: String,

    /// Model/deployment used for image generation (falls back to
    /// `text_model` when empty)
    #[serde(default)]
    pub image_model: String,

    /// HTTP request timeout (default: 120 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl ProviderConfig {
    /// The model used for image generation requests
    pub fn image_model(&self) -> &str {
        if self.image_model.is_empty() {
            &self.text_model
        } else {
            &self.image_model
        }
    }
}

/// Catalog accumulation configuration (target, batching, stall policy)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Number of records to accumulate (default: 200)
    #[serde(default = "default_target_count")]
    pub target_count: usize,

    /// Requested batch size per producer call (default: 20)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of categories to generate (default: 20)
    #[serde(default = "default_category_count")]
    pub category_count: usize,

    /// Extra producer calls allowed after a zero-progress batch before the
    /// accumulation phase gives up (default: 0, stop on first stall)
    #[serde(default)]
    pub stall_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            target_count: default_target_count(),
            batch_size: default_batch_size(),
            category_count: default_category_count(),
            stall_retries: 0,
        }
    }
}

/// Artifact phase configuration (output layout, concurrency, image size)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Root output directory for catalog, categories, and artifacts
    /// (default: "./data_seed")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum concurrent artifact fetches (default: 4)
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Generated image edge length in pixels (default: 1024)
    #[serde(default = "default_image_size")]
    pub image_size: u32,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency_limit: default_concurrency_limit(),
            image_size: default_image_size(),
        }
    }
}

impl ArtifactConfig {
    /// Directory holding one artifact file per record
    pub fn artifacts_dir(&self) -> PathBuf {
        self.output_dir.join("images")
    }
}

/// Retry configuration for transient artifact fetch failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of fetch attempts per record, including the first
    /// (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 500 milliseconds)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 8 seconds)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for the pipeline
///
/// Fields are organized into logical sub-configs:
/// - [`provider`](ProviderConfig): endpoint, credentials, models
/// - [`generation`](GenerationConfig): target count, batching, stall policy
/// - [`artifacts`](ArtifactConfig): output layout, concurrency, image size
/// - [`retry`](RetryConfig): backoff policy for artifact fetches
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Provider connection settings
    pub provider: ProviderConfig,

    /// Catalog accumulation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Artifact phase settings
    #[serde(default)]
    pub artifacts: ArtifactConfig,

    /// Retry policy for artifact fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// Skip the artifact phase entirely (accumulation still runs)
    #[serde(default)]
    pub dry_run: bool,
}

impl Config {
    /// Build a configuration from the process environment.
    ///
    /// Reads `PROVIDER_ENDPOINT`, `PROVIDER_API_KEY`, `TEXT_MODEL`,
    /// `IMAGE_MODEL`, `OUTPUT_DIR`, `TARGET_COUNT`, `BATCH_SIZE`,
    /// `IMAGE_SIZE`, `PARALLEL_IMAGE_REQUESTS`, `MAX_RETRIES`, and `DRY_RUN`.
    /// Values absent from the environment fall back to defaults; the three
    /// provider settings are required.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the missing or unparseable variable.
    pub fn from_env() -> Result<Self> {
        let provider = ProviderConfig {
            endpoint: require_env("PROVIDER_ENDPOINT")?,
            api_key: require_env("PROVIDER_API_KEY")?,
            text_model: require_env("TEXT_MODEL")?,
            image_model: std::env::var("IMAGE_MODEL").unwrap_or_default(),
            request_timeout: default_request_timeout(),
        };

        let generation = GenerationConfig {
            target_count: parse_env("TARGET_COUNT", default_target_count())?,
            batch_size: parse_env("BATCH_SIZE", default_batch_size())?,
            category_count: parse_env("CATEGORY_COUNT", default_category_count())?,
            stall_retries: parse_env("STALL_RETRIES", 0)?,
        };

        let artifacts = ArtifactConfig {
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_output_dir()),
            concurrency_limit: parse_env("PARALLEL_IMAGE_REQUESTS", default_concurrency_limit())?,
            image_size: parse_env("IMAGE_SIZE", default_image_size())?,
        };

        let retry = RetryConfig {
            max_attempts: parse_env("MAX_RETRIES", default_max_attempts())?,
            ..RetryConfig::default()
        };

        let dry_run = std::env::var("DRY_RUN")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let config = Self {
            provider,
            generation,
            artifacts,
            retry,
            dry_run,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.generation.target_count == 0 {
            return Err(config_error("target_count must be greater than zero", "target_count"));
        }
        if self.generation.batch_size == 0 {
            return Err(config_error("batch_size must be greater than zero", "batch_size"));
        }
        if self.artifacts.concurrency_limit == 0 {
            return Err(config_error(
                "concurrency_limit must be greater than zero",
                "concurrency_limit",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn require_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::Config {
            message: format!("required environment variable {key} is not set"),
            key: Some(key.to_string()),
        }),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| Error::Config {
            message: format!("environment variable {key} has invalid value {raw:?}"),
            key: Some(key.to_string()),
        }),
        Err(_) => Ok(default),
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./data_seed")
}

fn default_target_count() -> usize {
    200
}

fn default_batch_size() -> usize {
    20
}

fn default_category_count() -> usize {
    20
}

fn default_concurrency_limit() -> usize {
    4
}

fn default_image_size() -> u32 {
    1024
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(8)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds, for sub-second delays)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
