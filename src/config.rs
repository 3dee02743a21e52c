//! Environment-driven configuration.

use crate::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_WALRUS_PUBLISHER_URL: &str = "https://publisher.walrus-testnet.walrus.space";
const DEFAULT_WALRUS_AGGREGATOR_URL: &str = "https://aggregator.walrus-testnet.walrus.space";

/// Which [`crate::storage::BlobStore`] implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Walrus,
    Local,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walrus" => Ok(Self::Walrus),
            "local" => Ok(Self::Local),
            "memory" => Ok(Self::Memory),
            other => Err(Error::Config(format!(
                "Unknown STORAGE_BACKEND '{}'. Expected one of: walrus, local, memory",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub storage_backend: StorageBackend,
    pub walrus_publisher_url: String,
    pub walrus_aggregator_url: String,
    pub walrus_epochs: u32,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub generation_timeout: Duration,
    pub storage_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let gemini_api_key = var("GEMINI_API_KEY").ok_or_else(|| {
            Error::Config("GEMINI_API_KEY environment variable is required".to_string())
        })?;

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::Walrus,
        };

        Ok(Self {
            gemini_api_key,
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            storage_backend,
            walrus_publisher_url: trim_url(
                var("WALRUS_PUBLISHER_URL")
                    .unwrap_or_else(|| DEFAULT_WALRUS_PUBLISHER_URL.to_string()),
            ),
            walrus_aggregator_url: trim_url(
                var("WALRUS_AGGREGATOR_URL")
                    .unwrap_or_else(|| DEFAULT_WALRUS_AGGREGATOR_URL.to_string()),
            ),
            walrus_epochs: parse_number(&var, "WALRUS_EPOCHS", 1)?,
            output_dir: var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output")),
            temp_dir: var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("temp")),
            generation_timeout: Duration::from_secs(parse_number(
                &var,
                "GENERATION_TIMEOUT_SECS",
                120,
            )?),
            storage_timeout: Duration::from_secs(parse_number(&var, "STORAGE_TIMEOUT_SECS", 60)?),
        })
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn parse_number<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            Error::Config(format!("{} must be a positive integer, got '{}'", key, raw))
        }),
        None => Ok(default),
    }
}
