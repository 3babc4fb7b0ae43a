//! Declarative table of probe endpoints.

use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use super::{KeyMode, ProbeKind, ProbeRequest, ProbeTarget};

/// Named probe endpoints.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize,
)]
pub enum ProbeName {
    /// Insert a test service record.
    CosmosdbTestCreate,
    /// Count service records.
    CosmosdbTestGet,
    /// Write a test blob.
    StorageBlobTestCreate,
    /// Read one blob by id.
    StorageBlobTestGet,
    /// Read one blob by id, or count blobs when no id is given.
    StorageBlobTestLookup,
    /// Enqueue a test message.
    StorageQueueTestCreate,
    /// Dequeue a batch and drain the queue.
    StorageQueueTestGet,
    /// Insert a test row.
    StorageTableTestCreate,
    /// Count rows.
    StorageTableTestGet,
}

/// Static description of one probe endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeDescriptor {
    /// Endpoint name.
    pub name: ProbeName,
    /// Storage primitive.
    pub target: ProbeTarget,
    /// Operation.
    pub kind: ProbeKind,
    /// Key handling.
    pub key_mode: KeyMode,
    /// HTTP route (axum syntax).
    pub path: &'static str,
}

impl ProbeName {
    /// Descriptor for this probe.
    pub const fn descriptor(self) -> ProbeDescriptor {
        use ProbeKind::{Create, Read};
        use ProbeTarget::{BlobStore, DocumentStore, QueueStore, TableStore};

        let (target, kind, key_mode, path) = match self {
            Self::CosmosdbTestCreate => {
                (DocumentStore, Create, KeyMode::Unused, "/api/v1/cosmosdb/create")
            }
            Self::CosmosdbTestGet => (DocumentStore, Read, KeyMode::Unused, "/api/v1/cosmosdb/get"),
            Self::StorageBlobTestCreate => {
                (BlobStore, Create, KeyMode::Unused, "/api/v1/storage/blob/create")
            }
            Self::StorageBlobTestGet => (
                BlobStore,
                Read,
                KeyMode::Required,
                "/api/v1/storage/blob/get/:blob_id",
            ),
            Self::StorageBlobTestLookup => {
                (BlobStore, Read, KeyMode::Optional, "/api/v1/storage/blob/lookup")
            }
            Self::StorageQueueTestCreate => {
                (QueueStore, Create, KeyMode::Unused, "/api/v1/storage/queue/create")
            }
            Self::StorageQueueTestGet => {
                (QueueStore, Read, KeyMode::Unused, "/api/v1/storage/queue/get")
            }
            Self::StorageTableTestCreate => {
                (TableStore, Create, KeyMode::Unused, "/api/v1/storage/table/create")
            }
            Self::StorageTableTestGet => {
                (TableStore, Read, KeyMode::Unused, "/api/v1/storage/table/get")
            }
        };

        ProbeDescriptor {
            name: self,
            target,
            kind,
            key_mode,
            path,
        }
    }
}

impl ProbeDescriptor {
    /// Route with the key segment removed, for keyed probes.
    pub fn keyless_path(&self) -> Option<&'static str> {
        match self.key_mode {
            KeyMode::Required => self.path.rsplit_once("/:").map(|(bare, _)| bare),
            _ => None,
        }
    }

    /// Build the request for one invocation.
    pub fn request(&self, key: Option<String>) -> ProbeRequest {
        let request = ProbeRequest::new(self.target, self.kind);
        match self.key_mode {
            KeyMode::Unused => request,
            mode => request.with_key(mode, key),
        }
    }
}

/// Every probe descriptor, in declaration order.
pub fn registry() -> impl Iterator<Item = ProbeDescriptor> {
    ProbeName::iter().map(ProbeName::descriptor)
}
