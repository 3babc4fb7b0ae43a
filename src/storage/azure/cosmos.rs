//! Cosmos DB document collection adapter.
//!
//! Talks to the SQL REST API with a pre-issued authorization token. Service
//! records are partitioned by `serviceId`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::error::ProbeError;
use crate::storage::types::{NewService, ServiceRecord};
use crate::storage::DocumentStore;

use super::{ensure_success, header, ms_date};

const COSMOS_API_VERSION: &str = "2018-12-31";

/// Service collection client.
#[derive(Debug, Clone)]
pub struct CosmosServiceCollection {
    http: reqwest::Client,
    base_url: String,
    database: String,
    collection: String,
    auth_token: String,
}

/// One page of a `List Documents` response.
#[derive(Debug, Deserialize)]
struct DocumentsPage {
    #[serde(rename = "_count")]
    count: usize,
}

impl CosmosServiceCollection {
    /// Create a client for one collection.
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        database: String,
        collection: String,
        auth_token: String,
    ) -> Self {
        Self {
            http,
            base_url,
            database,
            collection,
            auth_token,
        }
    }

    fn docs_url(&self) -> Result<Url, ProbeError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProbeError::Malformed(format!("invalid Cosmos DB uri: {e}")))?;
        url.set_path(&format!(
            "/dbs/{}/colls/{}/docs",
            self.database, self.collection
        ));
        Ok(url)
    }

    fn authorization(&self) -> String {
        url::form_urlencoded::byte_serialize(self.auth_token.as_bytes()).collect()
    }
}

/// Partition key header value for a service id.
fn partition_key(service_id: &str) -> Result<String, ProbeError> {
    Ok(serde_json::to_string(&[service_id])?)
}

#[async_trait]
impl DocumentStore for CosmosServiceCollection {
    #[instrument(skip_all, fields(service_id = %service.service_id()))]
    async fn create_service(&self, service: NewService) -> Result<ServiceRecord, ProbeError> {
        let record = ServiceRecord::first_version(service);

        let response = self
            .http
            .post(self.docs_url()?)
            .header("authorization", self.authorization())
            .header("x-ms-date", ms_date()?.to_lowercase())
            .header("x-ms-version", COSMOS_API_VERSION)
            .header(
                "x-ms-documentdb-partitionkey",
                partition_key(record.service_id())?,
            )
            .json(&record)
            .send()
            .await?;
        ensure_success(response).await?;

        Ok(record)
    }

    #[instrument(skip_all)]
    async fn count_services(&self) -> Result<usize, ProbeError> {
        let mut total = 0;
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.docs_url()?)
                .header("authorization", self.authorization())
                .header("x-ms-date", ms_date()?.to_lowercase())
                .header("x-ms-version", COSMOS_API_VERSION)
                .header("x-ms-max-item-count", "-1")
                .header("x-ms-documentdb-query-enablecrosspartition", "true");
            if let Some(token) = &continuation {
                request = request.header("x-ms-continuation", token.as_str());
            }

            let response = ensure_success(request.send().await?).await?;
            continuation = header(&response, "x-ms-continuation").filter(|t| !t.is_empty());

            let page: DocumentsPage = serde_json::from_str(&response.text().await?)?;
            total += page.count;
            debug!(page = page.count, total, "read documents page");

            if continuation.is_none() {
                break;
            }
        }

        Ok(total)
    }
}
