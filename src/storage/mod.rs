//! Storage capabilities exercised by the probes.
//!
//! This module handles:
//! - Capability traits for document, blob, queue and table storage
//! - Record types passed across those traits
//! - The [`StorageHandles`] bundle injected at startup
//! - In-memory and Azure REST implementations

pub mod azure;
pub mod memory;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, StorageBackend};
use crate::error::{AppError, ProbeError};

pub use memory::{MemoryConfig, MemoryStorage};
pub use types::{
    BlobResult, NewService, ReceivedMessage, SendReceipt, ServiceMetadata, ServiceRecord,
    TableEntity, TableInsertResult,
};

/// Collection of service records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new service record.
    async fn create_service(&self, service: NewService) -> Result<ServiceRecord, ProbeError>;

    /// Count every record in the collection.
    async fn count_services(&self) -> Result<usize, ProbeError>;
}

/// Blob service scoped to named containers.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create or overwrite a text blob. `None` means the service gave no result.
    async fn upsert_text(
        &self,
        container: &str,
        name: &str,
        text: &str,
    ) -> Result<Option<BlobResult>, ProbeError>;

    /// Read a blob as text. `None` when the blob does not exist.
    async fn get_text(&self, container: &str, name: &str) -> Result<Option<String>, ProbeError>;

    /// Count blobs in a container.
    async fn count_blobs(&self, container: &str) -> Result<usize, ProbeError>;
}

/// Queue service scoped to named queues.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Enqueue one message. Service-side rejections come back in
    /// [`SendReceipt::error_code`] rather than as `Err`.
    async fn send(&self, queue: &str, text: &str) -> Result<SendReceipt, ProbeError>;

    /// Dequeue up to `max` messages.
    async fn receive(&self, queue: &str, max: usize) -> Result<Vec<ReceivedMessage>, ProbeError>;

    /// Delete every message in the queue.
    async fn clear(&self, queue: &str) -> Result<(), ProbeError>;
}

/// Table service scoped to named tables.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Insert one entity.
    async fn insert(&self, table: &str, entity: TableEntity)
        -> Result<TableInsertResult, ProbeError>;

    /// Run one unpaginated query over the whole table.
    async fn query_all(&self, table: &str) -> Result<Vec<TableEntity>, ProbeError>;
}

/// Storage handles shared by every probe.
#[derive(Clone)]
pub struct StorageHandles {
    /// Document collection.
    pub documents: Arc<dyn DocumentStore>,
    /// Blob service.
    pub blobs: Arc<dyn BlobStore>,
    /// Queue service.
    pub queues: Arc<dyn QueueStore>,
    /// Table service.
    pub tables: Arc<dyn TableStore>,
}

impl StorageHandles {
    /// Point every capability at one in-memory store.
    pub fn in_memory(storage: MemoryStorage) -> Self {
        let storage = Arc::new(storage);
        Self {
            documents: storage.clone(),
            blobs: storage.clone(),
            queues: storage.clone(),
            tables: storage,
        }
    }

    /// Build handles for the configured backend.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        match config.storage_backend {
            StorageBackend::Memory => Ok(Self::in_memory(MemoryStorage::new())),
            StorageBackend::Azure => azure::handles(config),
        }
    }
}

impl std::fmt::Debug for StorageHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageHandles").finish_non_exhaustive()
    }
}
