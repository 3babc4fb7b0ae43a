//! Application configuration loaded from environment variables.

use serde::Deserialize;
use strum::{Display, EnumString};

/// Which storage provider backs the probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorageBackend {
    /// In-process stores, nothing leaves the process.
    Memory,
    /// Azure Storage and Cosmos DB over REST.
    Azure,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Server Configuration ===
    /// HTTP server port for probe endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,

    // === Storage Selection ===
    /// Storage provider.
    #[serde(default = "default_backend")]
    pub storage_backend: StorageBackend,

    // === Azure Storage ===
    /// Blob service endpoint, e.g. `https://acct.blob.core.windows.net`.
    #[serde(default)]
    pub blob_service_url: Option<String>,

    /// Queue service endpoint.
    #[serde(default)]
    pub queue_service_url: Option<String>,

    /// Table service endpoint.
    #[serde(default)]
    pub table_service_url: Option<String>,

    /// Shared access signature, with or without the leading `?`.
    #[serde(default)]
    pub storage_sas_token: Option<String>,

    // === Cosmos DB ===
    /// Account endpoint, e.g. `https://acct.documents.azure.com:443`.
    #[serde(default)]
    pub cosmosdb_uri: Option<String>,

    /// Database name.
    #[serde(default)]
    pub cosmosdb_name: Option<String>,

    /// Collection holding service records.
    #[serde(default = "default_collection")]
    pub cosmosdb_collection: String,

    /// Pre-issued authorization token (resource token or AAD bearer).
    #[serde(default)]
    pub cosmosdb_auth_token: Option<String>,

    // === HTTP Client ===
    /// Request timeout for storage calls in milliseconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backend() -> StorageBackend {
    StorageBackend::Memory
}

fn default_collection() -> String {
    "services".to_string()
}

fn default_http_timeout() -> u64 {
    10_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            rust_log: default_log_level(),
            verbose: false,
            storage_backend: default_backend(),
            blob_service_url: None,
            queue_service_url: None,
            table_service_url: None,
            storage_sas_token: None,
            cosmosdb_uri: None,
            cosmosdb_name: None,
            cosmosdb_collection: default_collection(),
            cosmosdb_auth_token: None,
            http_timeout_ms: default_http_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.http_timeout_ms == 0 {
            return Err("HTTP_TIMEOUT_MS must be greater than 0".to_string());
        }

        if self.storage_backend == StorageBackend::Memory {
            return Ok(());
        }

        for (name, value) in [
            ("BLOB_SERVICE_URL", &self.blob_service_url),
            ("QUEUE_SERVICE_URL", &self.queue_service_url),
            ("TABLE_SERVICE_URL", &self.table_service_url),
            ("COSMOSDB_URI", &self.cosmosdb_uri),
        ] {
            let value = require(name, value)?;
            url::Url::parse(value).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
        }

        require("STORAGE_SAS_TOKEN", &self.storage_sas_token)?;
        require("COSMOSDB_NAME", &self.cosmosdb_name)?;
        require("COSMOSDB_AUTH_TOKEN", &self.cosmosdb_auth_token)?;

        if self.cosmosdb_collection.is_empty() {
            return Err("COSMOSDB_COLLECTION must not be empty".to_string());
        }

        Ok(())
    }

    /// SAS token without a leading `?`.
    pub fn sas_query(&self) -> &str {
        self.storage_sas_token
            .as_deref()
            .map(|t| t.trim_start_matches('?'))
            .unwrap_or_default()
    }
}

fn require<'a>(name: &str, value: &'a Option<String>) -> Result<&'a str, String> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(format!("{name} is required for the azure backend")),
    }
}
