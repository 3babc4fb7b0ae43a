//! Azure REST storage backend.
//!
//! Thin `reqwest` adapters covering only the calls the probes make:
//! - Blob, Queue and Table services, authenticated with a SAS token
//! - Cosmos DB document collection, authenticated with a pre-issued token

pub mod blob;
pub mod cosmos;
pub mod queue;
pub mod table;

use std::sync::Arc;
use std::time::Duration;

use time::macros::format_description;
use time::OffsetDateTime;
use url::Url;

use crate::config::Config;
use crate::error::{AppError, ProbeError};

use super::StorageHandles;

pub use blob::AzureBlobClient;
pub use cosmos::CosmosServiceCollection;
pub use queue::AzureQueueClient;
pub use table::AzureTableClient;

/// Storage REST API version sent with every Blob/Queue request.
pub const STORAGE_API_VERSION: &str = "2021-08-06";

/// Build handles backed by the Azure REST adapters.
pub fn handles(config: &Config) -> Result<StorageHandles, AppError> {
    let http = http_client(config)?;
    let sas = config.sas_query().to_string();

    Ok(StorageHandles {
        documents: Arc::new(CosmosServiceCollection::new(
            http.clone(),
            required("COSMOSDB_URI", &config.cosmosdb_uri)?,
            required("COSMOSDB_NAME", &config.cosmosdb_name)?,
            config.cosmosdb_collection.clone(),
            required("COSMOSDB_AUTH_TOKEN", &config.cosmosdb_auth_token)?,
        )),
        blobs: Arc::new(AzureBlobClient::new(
            http.clone(),
            required("BLOB_SERVICE_URL", &config.blob_service_url)?,
            sas.clone(),
        )),
        queues: Arc::new(AzureQueueClient::new(
            http.clone(),
            required("QUEUE_SERVICE_URL", &config.queue_service_url)?,
            sas.clone(),
        )),
        tables: Arc::new(AzureTableClient::new(
            http,
            required("TABLE_SERVICE_URL", &config.table_service_url)?,
            sas,
        )),
    })
}

fn required(name: &str, value: &Option<String>) -> Result<String, AppError> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidConfig(format!("{name} is required for the azure backend")))
}

/// Shared HTTP client for every adapter.
fn http_client(config: &Config) -> Result<reqwest::Client, AppError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.http_timeout_ms))
        .connect_timeout(Duration::from_secs(5))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()?;
    Ok(client)
}

/// Current time in the RFC 1123 form the `x-ms-date` header expects.
pub(crate) fn ms_date() -> Result<String, ProbeError> {
    OffsetDateTime::now_utc()
        .format(format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        ))
        .map_err(|e| ProbeError::Malformed(format!("cannot format x-ms-date: {e}")))
}

/// Join a service endpoint, a resource path and query parameters, then
/// append the SAS token. A path already on the endpoint (emulator account
/// names) is kept as a prefix.
pub(crate) fn sas_url(
    base: &str,
    path: &str,
    params: &[(&str, &str)],
    sas: &str,
) -> Result<Url, ProbeError> {
    let mut url = Url::parse(base)
        .map_err(|e| ProbeError::Malformed(format!("invalid service url {base}: {e}")))?;
    let joined = format!("{}{}", url.path().trim_end_matches('/'), path);
    url.set_path(&joined);

    let mut query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    if !sas.is_empty() {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(sas);
    }
    url.set_query((!query.is_empty()).then_some(query.as_str()));
    Ok(url)
}

/// Turn a non-success response into [`ProbeError::Status`].
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProbeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProbeError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Value of a response header as an owned string.
pub(crate) fn header(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sas_url_appends_token_after_params() {
        let url = sas_url(
            "https://acct.blob.core.windows.net",
            "/message-blob",
            &[("restype", "container"), ("comp", "list")],
            "sv=2022&sig=a%2Fb",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://acct.blob.core.windows.net/message-blob?restype=container&comp=list&sv=2022&sig=a%2Fb"
        );
    }

    #[test]
    fn sas_url_without_params_or_token() {
        let url = sas_url("http://127.0.0.1:10000/devstoreaccount1/", "/q", &[], "").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:10000/devstoreaccount1/q");
    }

    #[test]
    fn sas_url_rejects_garbage_base() {
        assert!(sas_url("nope", "/x", &[], "").is_err());
    }

    #[test]
    fn ms_date_ends_with_gmt() {
        let date = ms_date().unwrap();
        assert!(date.ends_with(" GMT"));
        assert_eq!(date.split(' ').count(), 6);
    }

    #[test]
    fn handles_require_cosmos_token() {
        let config = Config {
            storage_backend: crate::config::StorageBackend::Azure,
            blob_service_url: Some("https://a.blob.core.windows.net".to_string()),
            queue_service_url: Some("https://a.queue.core.windows.net".to_string()),
            table_service_url: Some("https://a.table.core.windows.net".to_string()),
            storage_sas_token: Some("sig=x".to_string()),
            cosmosdb_uri: Some("https://a.documents.azure.com".to_string()),
            cosmosdb_name: Some("db".to_string()),
            ..Config::default()
        };
        let err = handles(&config).unwrap_err();
        assert!(err.to_string().contains("COSMOSDB_AUTH_TOKEN"));
    }
}
