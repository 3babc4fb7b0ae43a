//! Table service adapter.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::ProbeError;
use crate::storage::types::{TableEntity, TableInsertResult};
use crate::storage::TableStore;

use super::{ensure_success, header, ms_date, sas_url};

const TABLE_API_VERSION: &str = "2019-02-02";
const JSON_NO_METADATA: &str = "application/json;odata=nometadata";

/// Table service client.
#[derive(Debug, Clone)]
pub struct AzureTableClient {
    http: reqwest::Client,
    base_url: String,
    sas: String,
}

/// Body of a `Query Entities` response.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    value: Vec<TableEntity>,
}

impl AzureTableClient {
    /// Create a client for the given service endpoint.
    pub fn new(http: reqwest::Client, base_url: String, sas: String) -> Self {
        Self { http, base_url, sas }
    }
}

#[async_trait]
impl TableStore for AzureTableClient {
    #[instrument(skip_all, fields(table = %table, row_key = %entity.row_key))]
    async fn insert(
        &self,
        table: &str,
        entity: TableEntity,
    ) -> Result<TableInsertResult, ProbeError> {
        let url = sas_url(&self.base_url, &format!("/{table}"), &[], &self.sas)?;

        let response = self
            .http
            .post(url)
            .header("x-ms-version", TABLE_API_VERSION)
            .header("x-ms-date", ms_date()?)
            .header("accept", JSON_NO_METADATA)
            .header("prefer", "return-no-content")
            .header("dataserviceversion", "3.0;NetFx")
            .json(&entity)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        Ok(TableInsertResult::with_etag(header(&response, "etag")))
    }

    // Single request: continuation tokens are ignored.
    #[instrument(skip_all, fields(table = %table))]
    async fn query_all(&self, table: &str) -> Result<Vec<TableEntity>, ProbeError> {
        let url = sas_url(&self.base_url, &format!("/{table}()"), &[], &self.sas)?;

        let response = self
            .http
            .get(url)
            .header("x-ms-version", TABLE_API_VERSION)
            .header("x-ms-date", ms_date()?)
            .header("accept", JSON_NO_METADATA)
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;

        let page: QueryResponse = serde_json::from_str(&body)?;
        debug!(rows = page.value.len(), "queried table");
        Ok(page.value)
    }
}
