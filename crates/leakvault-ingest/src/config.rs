//! Ingest job configuration
//!
//! Values come from the environment (a `.env` file is honoured), can be
//! overridden by CLI flags, and are validated once before the job touches any
//! input.

use serde::{Deserialize, Serialize};

use crate::aws::AwsConfig;
use crate::error::{IngestError, Result};
use leakvault_common::{UNKNOWN_DOMAIN, UNKNOWN_EMAIL};

// ============================================================================
// Defaults
// ============================================================================

/// Parallel insert workers; also the depth of the batch queue.
pub const DEFAULT_WORKERS: usize = 3;

/// Lines per batch. Matches the largest DynamoDB batch write.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Longest accepted input line, terminator included (64 KiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Argon2 memory cost in KiB (64 MiB).
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 64 * 1024;

/// Argon2 passes over memory.
pub const DEFAULT_HASH_ITERATIONS: u32 = 3;

/// Argon2 lanes.
pub const DEFAULT_HASH_PARALLELISM: u32 = 1;

/// Primary variable naming the sink destination.
pub const TABLE_NAME_VAR: &str = "LEAKVAULT_TABLE_NAME";

/// Older deployments set this instead; read when the primary is absent.
pub const LEGACY_TABLE_NAME_VAR: &str = "COMPROMISEDCREDENTIALS_TABLE_NAME";

/// Top-level ingest configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Table name for DynamoDB, file path for the JSON-lines sink
    pub destination: Option<String>,
    pub pipeline: PipelineConfig,
    pub hash: HashConfig,
    pub sentinels: Sentinels,
    pub aws: AwsConfig,
}

/// Shape of the dispatcher's worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of workers, and capacity of the batch queue
    pub workers: usize,
    /// Maximum lines per batch
    pub batch_size: usize,
    /// A longer line fails the run instead of being buffered
    pub max_line_bytes: usize,
}

/// Argon2id work factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

/// Placeholders for fields the parser cannot derive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentinels {
    pub email: String,
    pub domain: String,
}

impl IngestConfig {
    /// Read every setting from the environment without validating
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            destination: std::env::var(TABLE_NAME_VAR)
                .or_else(|_| std::env::var(LEGACY_TABLE_NAME_VAR))
                .ok()
                .filter(|name| !name.trim().is_empty()),
            pipeline: PipelineConfig {
                workers: env_or("LEAKVAULT_WORKERS", DEFAULT_WORKERS),
                batch_size: env_or("LEAKVAULT_BATCH_SIZE", DEFAULT_BATCH_SIZE),
                max_line_bytes: env_or("LEAKVAULT_MAX_LINE_BYTES", DEFAULT_MAX_LINE_BYTES),
            },
            hash: HashConfig {
                memory_kib: env_or("LEAKVAULT_HASH_MEMORY_KIB", DEFAULT_HASH_MEMORY_KIB),
                iterations: env_or("LEAKVAULT_HASH_ITERATIONS", DEFAULT_HASH_ITERATIONS),
                parallelism: env_or("LEAKVAULT_HASH_PARALLELISM", DEFAULT_HASH_PARALLELISM),
            },
            sentinels: Sentinels {
                email: std::env::var("LEAKVAULT_EMPTY_EMAIL")
                    .unwrap_or_else(|_| UNKNOWN_EMAIL.to_string()),
                domain: std::env::var("LEAKVAULT_EMPTY_DOMAIN")
                    .unwrap_or_else(|_| UNKNOWN_DOMAIN.to_string()),
            },
            aws: AwsConfig::from_env(),
        }
    }

    /// Load from the environment and validate
    pub fn load() -> Result<Self> {
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.destination()?;
        self.pipeline.validate()?;
        self.hash.validate()?;

        if self.sentinels.email.is_empty() {
            return Err(IngestError::Configuration(
                "LEAKVAULT_EMPTY_EMAIL cannot be empty".to_string(),
            ));
        }
        if self.sentinels.domain.is_empty() {
            return Err(IngestError::Configuration(
                "LEAKVAULT_EMPTY_DOMAIN cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Sink destination; missing is fatal
    pub fn destination(&self) -> Result<&str> {
        self.destination.as_deref().ok_or_else(|| {
            IngestError::Configuration(format!("{} environment variable is not set", TABLE_NAME_VAR))
        })
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(IngestError::Configuration(
                "LEAKVAULT_WORKERS must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(IngestError::Configuration(
                "LEAKVAULT_BATCH_SIZE must be greater than 0".to_string(),
            ));
        }
        if self.max_line_bytes == 0 {
            return Err(IngestError::Configuration(
                "LEAKVAULT_MAX_LINE_BYTES must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl HashConfig {
    pub fn validate(&self) -> Result<()> {
        argon2::Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map(|_| ())
            .map_err(|e| IngestError::Configuration(format!("Invalid Argon2 parameters: {}", e)))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_HASH_MEMORY_KIB,
            iterations: DEFAULT_HASH_ITERATIONS,
            parallelism: DEFAULT_HASH_PARALLELISM,
        }
    }
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            email: UNKNOWN_EMAIL.to_string(),
            domain: UNKNOWN_DOMAIN.to_string(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
