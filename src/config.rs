//! Environment-variable configuration for the worker process.

use crate::chromium::EngineConfig;
use crate::queue::QueueConfig;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Full worker configuration, loaded once at startup and read-only after.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub redis_url: String,
    pub concurrency: usize,
    pub queue: QueueConfig,
    pub engine: EngineConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// S3-compatible endpoint override (MinIO, localstack).
    pub endpoint: Option<String>,
    /// Public URL base override; derived from endpoint/bucket/region when
    /// unset.
    pub public_url: Option<String>,
}

impl StorageConfig {
    /// Base every uploaded object's public URL is joined onto.
    pub fn public_base(&self) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from the environment. `S3_BUCKET` is required;
    /// everything else has a default.
    pub fn from_env() -> Result<Self> {
        let bucket =
            std::env::var("S3_BUCKET").context("S3_BUCKET must be set to the upload bucket")?;

        Ok(Self {
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            concurrency: env_parse("WORKER_CONCURRENCY", 4)?,
            queue: QueueConfig {
                name: env_or("RENDER_QUEUE", "docgen:render"),
                max_attempts: env_parse("MAX_ATTEMPTS", 3)?,
                backoff_base: Duration::from_millis(env_parse("BACKOFF_BASE_MS", 5000)?),
            },
            engine: EngineConfig {
                chrome_path: std::env::var("CHROME_PATH").ok().map(PathBuf::from),
                navigation_timeout: Duration::from_millis(env_parse(
                    "NAVIGATION_TIMEOUT_MS",
                    30_000,
                )?),
            },
            storage: StorageConfig {
                bucket,
                region: env_or("S3_REGION", "us-east-1"),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
                public_url: std::env::var("STORAGE_PUBLIC_URL").ok(),
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
