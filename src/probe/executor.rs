//! Probe executor.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{info, instrument, warn};

use crate::error::ProbeError;
use crate::metrics;
use crate::storage::{NewService, StorageHandles, TableEntity};
use crate::utils::random_key;

use super::{
    ok_message, KeyMode, ProbeKind, ProbeName, ProbeOutcome, ProbeRequest, ProbeTarget,
    BLOB_CONTAINER, FEED_TABLE, QUEUE_BATCH_SIZE, QUEUE_NAME, TEST_CONTENT,
};

/// Build the fixed-shape service record used by the document probe.
///
/// # Panics
///
/// Panics if the hard-coded fields stop passing validation.
pub fn test_service() -> NewService {
    NewService::try_new(random_key(), "Test", "AgID", "01234567890", "IT")
        .expect("hard-coded service create test input is valid")
}

/// Queue payload: the JSON string `"TEST"`, base64 encoded.
pub fn queue_payload() -> Result<String, ProbeError> {
    Ok(STANDARD.encode(serde_json::to_string(TEST_CONTENT)?))
}

/// Runs probes against a set of storage handles.
#[derive(Debug, Clone)]
pub struct ProbeExecutor {
    storage: StorageHandles,
}

impl ProbeExecutor {
    /// Create an executor over the given handles.
    pub fn new(storage: StorageHandles) -> Self {
        Self { storage }
    }

    /// Run a named probe, recording metrics and logging the outcome.
    pub async fn run(&self, name: ProbeName, key: Option<String>) -> ProbeOutcome {
        let request = name.descriptor().request(key);

        let outcome = {
            let _timer = metrics::timer_probe(name);
            self.execute(&request).await
        };
        metrics::record_probe_outcome(name, outcome.is_success());

        match &outcome {
            ProbeOutcome::Success { message } => info!(probe = %name, %message, "probe succeeded"),
            ProbeOutcome::Failure { error_detail } => {
                warn!(probe = %name, error = %error_detail, "probe failed")
            }
        }
        outcome
    }

    /// Execute one storage operation and translate its result.
    #[instrument(skip_all, fields(target = %request.target, kind = %request.kind))]
    pub async fn execute(&self, request: &ProbeRequest) -> ProbeOutcome {
        let result = match (request.target, request.kind) {
            (ProbeTarget::DocumentStore, ProbeKind::Create) => self.create_document().await,
            (ProbeTarget::DocumentStore, ProbeKind::Read) => self.count_documents().await,
            (ProbeTarget::BlobStore, ProbeKind::Create) => self.create_blob().await,
            (ProbeTarget::BlobStore, ProbeKind::Read) => {
                self.read_blob(request.key_mode, request.key.as_deref()).await
            }
            (ProbeTarget::QueueStore, ProbeKind::Create) => self.create_message().await,
            (ProbeTarget::QueueStore, ProbeKind::Read) => self.drain_queue().await,
            (ProbeTarget::TableStore, ProbeKind::Create) => self.create_row().await,
            (ProbeTarget::TableStore, ProbeKind::Read) => self.count_rows().await,
        };
        ProbeOutcome::from(result)
    }

    async fn create_document(&self) -> Result<String, ProbeError> {
        let record = self.storage.documents.create_service(test_service()).await?;
        Ok(ok_message("serviceId", record.service_id()))
    }

    async fn count_documents(&self) -> Result<String, ProbeError> {
        let count = self.storage.documents.count_services().await?;
        Ok(ok_message("count", count))
    }

    async fn create_blob(&self) -> Result<String, ProbeError> {
        let result = self
            .storage
            .blobs
            .upsert_text(BLOB_CONTAINER, &random_key(), TEST_CONTENT)
            .await?
            .ok_or_else(|| ProbeError::MissingResult("Missing Blob create result".to_string()))?;
        Ok(ok_message("blobId", result.name))
    }

    async fn read_blob(&self, key_mode: KeyMode, key: Option<&str>) -> Result<String, ProbeError> {
        match (key, key_mode) {
            (Some(blob_id), _) => {
                let body = self
                    .storage
                    .blobs
                    .get_text(BLOB_CONTAINER, blob_id)
                    .await?
                    .ok_or_else(|| ProbeError::NotFound("Missing Blob".to_string()))?;
                Ok(ok_message("body", body))
            }
            (None, KeyMode::Optional) => {
                let count = self.storage.blobs.count_blobs(BLOB_CONTAINER).await?;
                Ok(ok_message("count", count))
            }
            (None, _) => Err(ProbeError::MissingParameter("blobId")),
        }
    }

    async fn create_message(&self) -> Result<String, ProbeError> {
        let receipt = self.storage.queues.send(QUEUE_NAME, &queue_payload()?).await?;
        if let Some(code) = receipt.rejection() {
            return Err(ProbeError::QueueRejected(code.to_string()));
        }
        Ok(ok_message("messageId", receipt.message_id))
    }

    // Receive first, then clear; the count is taken before the clear.
    async fn drain_queue(&self) -> Result<String, ProbeError> {
        let received = self
            .storage
            .queues
            .receive(QUEUE_NAME, QUEUE_BATCH_SIZE)
            .await?;
        self.storage.queues.clear(QUEUE_NAME).await?;
        Ok(ok_message("count", received.len()))
    }

    async fn create_row(&self) -> Result<String, ProbeError> {
        let entity = TableEntity {
            partition_key: TEST_CONTENT.to_string(),
            row_key: random_key(),
        };
        let result = self.storage.tables.insert(FEED_TABLE, entity).await?;
        Ok(ok_message("response", serde_json::to_string(&result)?))
    }

    async fn count_rows(&self) -> Result<String, ProbeError> {
        let rows = self.storage.tables.query_all(FEED_TABLE).await?;
        Ok(ok_message("response", rows.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryConfig, MemoryStorage, TableStore};
    use pretty_assertions::assert_eq;

    fn executor() -> (ProbeExecutor, MemoryStorage) {
        let storage = MemoryStorage::new();
        (
            ProbeExecutor::new(StorageHandles::in_memory(storage.clone())),
            storage,
        )
    }

    fn failing(config: MemoryConfig) -> ProbeExecutor {
        ProbeExecutor::new(StorageHandles::in_memory(MemoryStorage::with_config(config)))
    }

    fn message_value(outcome: &ProbeOutcome, field: &str) -> String {
        let text = outcome.text();
        let prefix = format!("OK ({field}=");
        assert!(text.starts_with(&prefix), "unexpected outcome: {text}");
        text[prefix.len()..text.len() - 1].to_string()
    }

    #[test]
    fn test_service_is_valid() {
        let service = test_service();
        assert_eq!(service.service_name(), "Test");
        assert!(!service.service_id().is_empty());
    }

    #[test]
    fn queue_payload_is_base64_json_string() {
        assert_eq!(queue_payload().unwrap(), "IlRFU1Qi");
    }

    #[tokio::test]
    async fn document_create_then_read_reflects_new_record() {
        let (executor, _) = executor();

        let before = executor.run(ProbeName::CosmosdbTestGet, None).await;
        assert_eq!(message_value(&before, "count"), "0");

        let created = executor.run(ProbeName::CosmosdbTestCreate, None).await;
        assert!(created.is_success());

        let after = executor.run(ProbeName::CosmosdbTestGet, None).await;
        assert_eq!(message_value(&after, "count"), "1");
    }

    #[tokio::test]
    async fn create_probes_generate_distinct_keys() {
        let (executor, _) = executor();
        for (name, field) in [
            (ProbeName::CosmosdbTestCreate, "serviceId"),
            (ProbeName::StorageBlobTestCreate, "blobId"),
            (ProbeName::StorageQueueTestCreate, "messageId"),
        ] {
            let first = executor.run(name, None).await;
            let second = executor.run(name, None).await;
            assert_ne!(message_value(&first, field), message_value(&second, field));
        }
    }

    #[tokio::test]
    async fn table_creates_use_distinct_row_keys() {
        let (executor, storage) = executor();
        for _ in 0..2 {
            let created = executor.run(ProbeName::StorageTableTestCreate, None).await;
            assert!(created.is_success(), "{}", created.text());
        }

        let rows = storage.query_all(FEED_TABLE).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].row_key, rows[1].row_key);
        assert!(rows.iter().all(|row| row.partition_key == TEST_CONTENT));
    }

    #[tokio::test]
    async fn blob_written_by_create_reads_back() {
        let (executor, _) = executor();
        let created = executor.run(ProbeName::StorageBlobTestCreate, None).await;
        let blob_id = message_value(&created, "blobId");

        let read = executor.run(ProbeName::StorageBlobTestGet, Some(blob_id)).await;
        assert_eq!(read.text(), "OK (body=TEST)");
    }

    #[tokio::test]
    async fn unknown_blob_is_a_failure() {
        let (executor, _) = executor();
        let read = executor
            .run(ProbeName::StorageBlobTestGet, Some("never-written".to_string()))
            .await;
        assert_eq!(
            read,
            ProbeOutcome::Failure {
                error_detail: "Missing Blob".to_string()
            }
        );
    }

    #[tokio::test]
    async fn required_key_missing_is_a_failure() {
        let (executor, _) = executor();
        let read = executor.run(ProbeName::StorageBlobTestGet, None).await;
        assert!(!read.is_success());
        assert!(read.text().contains("blobId"));
    }

    #[tokio::test]
    async fn optional_key_absent_counts_blobs() {
        let (executor, _) = executor();
        assert_eq!(
            executor.run(ProbeName::StorageBlobTestLookup, None).await.text(),
            "OK (count=0)"
        );

        executor.run(ProbeName::StorageBlobTestCreate, None).await;
        executor.run(ProbeName::StorageBlobTestCreate, None).await;
        assert_eq!(
            executor.run(ProbeName::StorageBlobTestLookup, None).await.text(),
            "OK (count=2)"
        );
    }

    #[tokio::test]
    async fn optional_key_present_reads_blob() {
        let (executor, _) = executor();
        let blob_id = message_value(
            &executor.run(ProbeName::StorageBlobTestCreate, None).await,
            "blobId",
        );
        let read = executor.run(ProbeName::StorageBlobTestLookup, Some(blob_id)).await;
        assert_eq!(read.text(), "OK (body=TEST)");
    }

    #[tokio::test]
    async fn queue_read_drains_queue() {
        let (executor, storage) = executor();
        executor.run(ProbeName::StorageQueueTestCreate, None).await;

        let first = executor.run(ProbeName::StorageQueueTestGet, None).await;
        assert_eq!(first.text(), "OK (count=1)");

        let second = executor.run(ProbeName::StorageQueueTestGet, None).await;
        assert_eq!(second.text(), "OK (count=0)");
        assert_eq!(storage.queue_len(QUEUE_NAME), 0);
    }

    #[tokio::test]
    async fn queue_read_reports_batch_but_clears_everything() {
        let (executor, storage) = executor();
        for _ in 0..40 {
            executor.run(ProbeName::StorageQueueTestCreate, None).await;
        }

        let read = executor.run(ProbeName::StorageQueueTestGet, None).await;
        assert_eq!(read.text(), "OK (count=32)");
        assert_eq!(storage.queue_len(QUEUE_NAME), 0);
    }

    #[tokio::test]
    async fn queue_error_code_is_a_failure() {
        let executor = failing(MemoryConfig {
            queue_error_code: Some("QueueDisabled".to_string()),
            ..Default::default()
        });
        let outcome = executor.run(ProbeName::StorageQueueTestCreate, None).await;
        assert_eq!(outcome.text(), "Queue create failed with QueueDisabled");
    }

    #[tokio::test]
    async fn failed_clear_fails_queue_read() {
        let executor = failing(MemoryConfig {
            fail_queue_clear: true,
            ..Default::default()
        });
        let outcome = executor.run(ProbeName::StorageQueueTestGet, None).await;
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn table_count_tracks_creates() {
        let (executor, _) = executor();
        for _ in 0..3 {
            let created = executor.run(ProbeName::StorageTableTestCreate, None).await;
            assert!(created.text().starts_with("OK (response={\".metadata\""));
        }
        let read = executor.run(ProbeName::StorageTableTestGet, None).await;
        assert_eq!(read.text(), "OK (response=3)");
    }

    #[tokio::test]
    async fn blob_create_without_result_is_a_failure() {
        let executor = failing(MemoryConfig {
            blob_write_without_result: true,
            ..Default::default()
        });
        let outcome = executor.run(ProbeName::StorageBlobTestCreate, None).await;
        assert_eq!(outcome.text(), "Missing Blob create result");
    }

    #[tokio::test]
    async fn storage_errors_become_failures() {
        let executor = failing(MemoryConfig {
            fail_documents: true,
            fail_blobs: true,
            fail_queues: true,
            fail_tables: true,
            ..Default::default()
        });
        for descriptor in crate::probe::registry() {
            let outcome = executor.run(descriptor.name, Some("k".to_string())).await;
            assert!(!outcome.is_success(), "{} should fail", descriptor.name);
        }
    }

    #[tokio::test]
    async fn missing_table_is_a_failure() {
        let executor = ProbeExecutor::new(StorageHandles::in_memory(MemoryStorage::bare(
            MemoryConfig::default(),
        )));
        let outcome = executor.run(ProbeName::StorageTableTestGet, None).await;
        assert_eq!(outcome.text(), "table subscriptionfeed not found");
    }
}
