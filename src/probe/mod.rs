//! Probe data model, descriptor registry and executor.
//!
//! A probe runs exactly one storage operation and reports a [`ProbeOutcome`].
//! Every endpoint is one [`ProbeDescriptor`]; the [`ProbeExecutor`] is shared
//! by all of them.

pub mod executor;
pub mod registry;

use serde::Serialize;
use strum::Display;

pub use executor::ProbeExecutor;
pub use registry::{registry, ProbeDescriptor, ProbeName};

/// Blob container written and read by the blob probes.
pub const BLOB_CONTAINER: &str = "message-blob";
/// Queue used by the queue probes.
pub const QUEUE_NAME: &str = "message-queue";
/// Table used by the table probes.
pub const FEED_TABLE: &str = "subscriptionfeed";
/// Payload written by the create probes; also the table partition key.
pub const TEST_CONTENT: &str = "TEST";
/// Messages dequeued per queue read.
pub const QUEUE_BATCH_SIZE: usize = 32;

/// Storage primitive a probe exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum ProbeTarget {
    /// Document database collection.
    DocumentStore,
    /// Blob container.
    BlobStore,
    /// Message queue.
    QueueStore,
    /// Table.
    TableStore,
}

/// Operation a probe performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum ProbeKind {
    /// Write throw-away data.
    Create,
    /// Read or count existing data.
    Read,
}

/// How a probe uses a caller-supplied key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum KeyMode {
    /// The probe takes no key.
    Unused,
    /// A key must be supplied.
    Required,
    /// Without a key the probe falls back to a count.
    Optional,
}

/// One probe invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    /// Storage primitive.
    pub target: ProbeTarget,
    /// Operation.
    pub kind: ProbeKind,
    /// Key handling.
    pub key_mode: KeyMode,
    /// Caller-supplied key; empty strings are treated as absent.
    pub key: Option<String>,
}

impl ProbeRequest {
    /// Request with no key.
    pub fn new(target: ProbeTarget, kind: ProbeKind) -> Self {
        Self {
            target,
            kind,
            key_mode: KeyMode::Unused,
            key: None,
        }
    }

    /// Attach a key and its handling.
    pub fn with_key(mut self, key_mode: KeyMode, key: Option<String>) -> Self {
        self.key_mode = key_mode;
        self.key = key.filter(|k| !k.is_empty());
        self
    }
}

/// Result of one probe invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ProbeOutcome {
    /// The operation took effect.
    Success {
        /// `OK (<field>=<value>)`.
        message: String,
    },
    /// The operation failed.
    Failure {
        /// Error text for the operator.
        error_detail: String,
    },
}

impl ProbeOutcome {
    /// Whether the probe succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Success message or failure detail.
    pub fn text(&self) -> &str {
        match self {
            Self::Success { message } => message,
            Self::Failure { error_detail } => error_detail,
        }
    }
}

impl<E: std::fmt::Display> From<Result<String, E>> for ProbeOutcome {
    fn from(result: Result<String, E>) -> Self {
        match result {
            Ok(message) => Self::Success { message },
            Err(e) => Self::Failure {
                error_detail: e.to_string(),
            },
        }
    }
}

/// Format a success message.
pub fn ok_message(field: &str, value: impl std::fmt::Display) -> String {
    format!("OK ({field}={value})")
}
