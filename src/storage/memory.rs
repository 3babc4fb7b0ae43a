//! In-process storage backend.
//!
//! Implements every storage capability without network access. Used for
//! local runs (`STORAGE_BACKEND=memory`) and by the test suites, which rely
//! on [`MemoryConfig`] to inject failures.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::ProbeError;
use crate::probe::{BLOB_CONTAINER, FEED_TABLE, QUEUE_NAME};
use crate::utils::random_key;

use super::types::{
    BlobResult, NewService, ReceivedMessage, SendReceipt, ServiceRecord, TableEntity,
    TableInsertResult,
};
use super::{BlobStore, DocumentStore, QueueStore, TableStore};

/// Configuration for in-memory backend behavior.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    /// Whether document calls fail.
    pub fail_documents: bool,
    /// Whether blob calls fail.
    pub fail_blobs: bool,
    /// Whether queue calls fail.
    pub fail_queues: bool,
    /// Whether only the queue clear call fails.
    pub fail_queue_clear: bool,
    /// Whether table calls fail.
    pub fail_tables: bool,
    /// Error code placed on every send receipt.
    pub queue_error_code: Option<String>,
    /// Whether blob writes succeed without returning a result.
    pub blob_write_without_result: bool,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

#[derive(Debug, Default)]
struct Inner {
    services: Mutex<Vec<ServiceRecord>>,
    containers: Mutex<HashSet<String>>,
    blobs: DashMap<(String, String), String>,
    queues: Mutex<HashMap<String, VecDeque<ReceivedMessage>>>,
    tables: Mutex<HashMap<String, Vec<TableEntity>>>,
}

/// In-memory storage for all four capabilities.
///
/// Clones share the same underlying data.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    config: MemoryConfig,
    inner: Arc<Inner>,
}

impl MemoryStorage {
    /// Storage with the probe container, queue and table already provisioned.
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    /// Provisioned storage with custom behavior.
    pub fn with_config(config: MemoryConfig) -> Self {
        let storage = Self::bare(config);
        storage.provision_container(BLOB_CONTAINER);
        storage.provision_queue(QUEUE_NAME);
        storage.provision_table(FEED_TABLE);
        storage
    }

    /// Storage with no containers, queues or tables.
    pub fn bare(config: MemoryConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Inner::default()),
        }
    }

    /// Create a blob container.
    pub fn provision_container(&self, name: &str) {
        lock(&self.inner.containers).insert(name.to_string());
    }

    /// Create a queue.
    pub fn provision_queue(&self, name: &str) {
        lock(&self.inner.queues).entry(name.to_string()).or_default();
    }

    /// Create a table.
    pub fn provision_table(&self, name: &str) {
        lock(&self.inner.tables).entry(name.to_string()).or_default();
    }

    /// Number of messages currently in a queue.
    pub fn queue_len(&self, queue: &str) -> usize {
        lock(&self.inner.queues).get(queue).map_or(0, VecDeque::len)
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    fn check_container(&self, container: &str) -> Result<(), ProbeError> {
        if lock(&self.inner.containers).contains(container) {
            Ok(())
        } else {
            Err(ProbeError::NotFound(format!(
                "container {container} not found"
            )))
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

// A poisoned lock only means another test thread panicked mid-update.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn injected(what: &str) -> ProbeError {
    ProbeError::Injected(format!("Mock {what} failure"))
}

#[async_trait]
impl DocumentStore for MemoryStorage {
    async fn create_service(&self, service: NewService) -> Result<ServiceRecord, ProbeError> {
        self.simulate_latency().await;
        if self.config.fail_documents {
            return Err(injected("document"));
        }

        let record = ServiceRecord::first_version(service);
        let mut services = lock(&self.inner.services);
        if services.iter().any(|s| s.id == record.id) {
            return Err(ProbeError::Status {
                status: 409,
                body: format!("document {} already exists", record.id),
            });
        }
        services.push(record.clone());
        Ok(record)
    }

    async fn count_services(&self) -> Result<usize, ProbeError> {
        self.simulate_latency().await;
        if self.config.fail_documents {
            return Err(injected("document"));
        }
        Ok(lock(&self.inner.services).len())
    }
}

#[async_trait]
impl BlobStore for MemoryStorage {
    async fn upsert_text(
        &self,
        container: &str,
        name: &str,
        text: &str,
    ) -> Result<Option<BlobResult>, ProbeError> {
        self.simulate_latency().await;
        if self.config.fail_blobs {
            return Err(injected("blob"));
        }
        self.check_container(container)?;

        self.inner
            .blobs
            .insert((container.to_string(), name.to_string()), text.to_string());

        if self.config.blob_write_without_result {
            return Ok(None);
        }
        Ok(Some(BlobResult {
            container: container.to_string(),
            name: name.to_string(),
            etag: Some(format!("\"0x{}\"", random_key().to_uppercase())),
        }))
    }

    async fn get_text(&self, container: &str, name: &str) -> Result<Option<String>, ProbeError> {
        self.simulate_latency().await;
        if self.config.fail_blobs {
            return Err(injected("blob"));
        }
        self.check_container(container)?;

        Ok(self
            .inner
            .blobs
            .get(&(container.to_string(), name.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn count_blobs(&self, container: &str) -> Result<usize, ProbeError> {
        self.simulate_latency().await;
        if self.config.fail_blobs {
            return Err(injected("blob"));
        }
        self.check_container(container)?;

        Ok(self
            .inner
            .blobs
            .iter()
            .filter(|entry| entry.key().0 == container)
            .count())
    }
}

#[async_trait]
impl QueueStore for MemoryStorage {
    async fn send(&self, queue: &str, text: &str) -> Result<SendReceipt, ProbeError> {
        self.simulate_latency().await;
        if self.config.fail_queues {
            return Err(injected("queue"));
        }

        let mut queues = lock(&self.inner.queues);
        let Some(messages) = queues.get_mut(queue) else {
            return Ok(SendReceipt {
                message_id: String::new(),
                error_code: Some("QueueNotFound".to_string()),
            });
        };

        if let Some(code) = &self.config.queue_error_code {
            return Ok(SendReceipt {
                message_id: String::new(),
                error_code: Some(code.clone()),
            });
        }

        let message_id = random_key();
        messages.push_back(ReceivedMessage {
            message_id: message_id.clone(),
            text: text.to_string(),
        });
        Ok(SendReceipt {
            message_id,
            error_code: None,
        })
    }

    async fn receive(&self, queue: &str, max: usize) -> Result<Vec<ReceivedMessage>, ProbeError> {
        self.simulate_latency().await;
        if self.config.fail_queues {
            return Err(injected("queue"));
        }

        let mut queues = lock(&self.inner.queues);
        let messages = queues
            .get_mut(queue)
            .ok_or_else(|| ProbeError::NotFound(format!("queue {queue} not found")))?;
        let take = max.min(messages.len());
        Ok(messages.drain(..take).collect())
    }

    async fn clear(&self, queue: &str) -> Result<(), ProbeError> {
        self.simulate_latency().await;
        if self.config.fail_queues || self.config.fail_queue_clear {
            return Err(injected("queue clear"));
        }

        let mut queues = lock(&self.inner.queues);
        queues
            .get_mut(queue)
            .ok_or_else(|| ProbeError::NotFound(format!("queue {queue} not found")))?
            .clear();
        Ok(())
    }
}

#[async_trait]
impl TableStore for MemoryStorage {
    async fn insert(
        &self,
        table: &str,
        entity: TableEntity,
    ) -> Result<TableInsertResult, ProbeError> {
        self.simulate_latency().await;
        if self.config.fail_tables {
            return Err(injected("table"));
        }

        let mut tables = lock(&self.inner.tables);
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| ProbeError::NotFound(format!("table {table} not found")))?;

        if rows
            .iter()
            .any(|r| r.partition_key == entity.partition_key && r.row_key == entity.row_key)
        {
            return Err(ProbeError::Status {
                status: 409,
                body: "EntityAlreadyExists".to_string(),
            });
        }
        rows.push(entity);
        Ok(TableInsertResult::with_etag(Some(format!(
            "W/\"datetime'{}'\"",
            random_key()
        ))))
    }

    async fn query_all(&self, table: &str) -> Result<Vec<TableEntity>, ProbeError> {
        self.simulate_latency().await;
        if self.config.fail_tables {
            return Err(injected("table"));
        }

        lock(&self.inner.tables)
            .get(table)
            .cloned()
            .ok_or_else(|| ProbeError::NotFound(format!("table {table} not found")))
    }
}
