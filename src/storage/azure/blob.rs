//! Blob service adapter.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::error::ProbeError;
use crate::storage::types::BlobResult;
use crate::storage::BlobStore;

use super::{ensure_success, header, ms_date, sas_url, STORAGE_API_VERSION};

static NEXT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<NextMarker>([^<]*)</NextMarker>").expect("valid regex"));

/// Blob service client.
#[derive(Debug, Clone)]
pub struct AzureBlobClient {
    http: reqwest::Client,
    base_url: String,
    sas: String,
}

impl AzureBlobClient {
    /// Create a client for the given service endpoint.
    pub fn new(http: reqwest::Client, base_url: String, sas: String) -> Self {
        Self { http, base_url, sas }
    }
}

/// Number of `<Blob>` entries and the continuation marker of one listing page.
fn parse_listing(body: &str) -> (usize, Option<String>) {
    let count = body.matches("<Blob>").count();
    let marker = NEXT_MARKER
        .captures(body)
        .map(|c| c[1].to_string())
        .filter(|m| !m.is_empty());
    (count, marker)
}

/// A 404 means "no such blob" only when the service says so; a missing
/// container is an error.
fn is_missing_blob(status: StatusCode, error_code: Option<&str>) -> bool {
    status == StatusCode::NOT_FOUND && error_code == Some("BlobNotFound")
}

#[async_trait]
impl BlobStore for AzureBlobClient {
    #[instrument(skip_all, fields(container = %container, blob = %name))]
    async fn upsert_text(
        &self,
        container: &str,
        name: &str,
        text: &str,
    ) -> Result<Option<BlobResult>, ProbeError> {
        let url = sas_url(&self.base_url, &format!("/{container}/{name}"), &[], &self.sas)?;

        let response = self
            .http
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-date", ms_date()?)
            .header("content-type", "text/plain; charset=utf-8")
            .body(text.to_string())
            .send()
            .await?;
        let response = ensure_success(response).await?;

        Ok(Some(BlobResult {
            container: container.to_string(),
            name: name.to_string(),
            etag: header(&response, "etag"),
        }))
    }

    #[instrument(skip_all, fields(container = %container, blob = %name))]
    async fn get_text(&self, container: &str, name: &str) -> Result<Option<String>, ProbeError> {
        let url = sas_url(&self.base_url, &format!("/{container}/{name}"), &[], &self.sas)?;

        let response = self
            .http
            .get(url)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-date", ms_date()?)
            .send()
            .await?;

        if is_missing_blob(response.status(), header(&response, "x-ms-error-code").as_deref()) {
            debug!("blob not found");
            return Ok(None);
        }

        let response = ensure_success(response).await?;
        Ok(Some(response.text().await?))
    }

    #[instrument(skip_all, fields(container = %container))]
    async fn count_blobs(&self, container: &str) -> Result<usize, ProbeError> {
        let mut total = 0;
        let mut marker: Option<String> = None;

        loop {
            let url = {
                let mut params = vec![("restype", "container"), ("comp", "list")];
                if let Some(m) = marker.as_deref() {
                    params.push(("marker", m));
                }
                sas_url(&self.base_url, &format!("/{container}"), &params, &self.sas)?
            };

            let response = self
                .http
                .get(url)
                .header("x-ms-version", STORAGE_API_VERSION)
                .header("x-ms-date", ms_date()?)
                .send()
                .await?;
            let body = ensure_success(response).await?.text().await?;

            let (count, next) = parse_listing(&body);
            total += count;
            debug!(page = count, total, "listed blobs");

            match next {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(total)
    }
}
