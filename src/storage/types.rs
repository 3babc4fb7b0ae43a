//! Record types exchanged with the storage capabilities.

use serde::{Deserialize, Serialize};

use crate::error::InvalidTestInput;

/// Scope of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceScope {
    /// Nationwide service.
    National,
    /// Local service.
    Local,
}

/// Extra service attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    /// Service scope.
    pub scope: ServiceScope,
    /// Token name used by the payment gateway.
    pub token_name: String,
}

/// Service record before it is stored.
///
/// Only [`NewService::try_new`] builds one, so every instance has passed
/// field validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewService {
    #[serde(rename = "authorizedCIDRs")]
    authorized_cidrs: Vec<String>,
    authorized_recipients: Vec<String>,
    department_name: String,
    is_visible: bool,
    max_allowed_payment_amount: u64,
    organization_fiscal_code: String,
    organization_name: String,
    require_secure_channels: bool,
    service_id: String,
    service_metadata: ServiceMetadata,
    service_name: String,
}

impl NewService {
    /// Build a test service with the given id, validating every field.
    pub fn try_new(
        service_id: impl Into<String>,
        service_name: impl Into<String>,
        organization_name: impl Into<String>,
        organization_fiscal_code: impl Into<String>,
        department_name: impl Into<String>,
    ) -> Result<Self, InvalidTestInput> {
        let service = Self {
            authorized_cidrs: Vec::new(),
            authorized_recipients: Vec::new(),
            department_name: department_name.into(),
            is_visible: true,
            max_allowed_payment_amount: 0,
            organization_fiscal_code: organization_fiscal_code.into(),
            organization_name: organization_name.into(),
            require_secure_channels: false,
            service_id: service_id.into(),
            service_metadata: ServiceMetadata {
                scope: ServiceScope::National,
                token_name: "TOKEN_NAME".to_string(),
            },
            service_name: service_name.into(),
        };
        service.check()?;
        Ok(service)
    }

    fn check(&self) -> Result<(), InvalidTestInput> {
        let non_empty = [
            ("serviceId", &self.service_id),
            ("serviceName", &self.service_name),
            ("organizationName", &self.organization_name),
            ("departmentName", &self.department_name),
        ];
        for (field, value) in non_empty {
            if value.trim().is_empty() {
                return Err(InvalidTestInput {
                    field,
                    reason: "must not be empty",
                });
            }
        }

        let code = &self.organization_fiscal_code;
        if code.len() != 11 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidTestInput {
                field: "organizationFiscalCode",
                reason: "must be 11 digits",
            });
        }

        Ok(())
    }

    /// Service id.
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Service display name.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

/// A stored service, as returned by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    /// Document id, `<serviceId>-<version>`.
    pub id: String,
    /// Record version.
    pub version: u32,
    /// Stored fields.
    #[serde(flatten)]
    pub service: NewService,
}

impl ServiceRecord {
    /// First version of a service.
    pub fn first_version(service: NewService) -> Self {
        Self {
            id: format!("{}-{:016}", service.service_id(), 0),
            version: 0,
            service,
        }
    }

    /// Service id.
    pub fn service_id(&self) -> &str {
        self.service.service_id()
    }
}

/// Result of a blob write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobResult {
    /// Container name.
    pub container: String,
    /// Blob name.
    pub name: String,
    /// Entity tag, if the service returned one.
    pub etag: Option<String>,
}

/// Receipt for an enqueued message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SendReceipt {
    /// Message id assigned by the queue.
    pub message_id: String,
    /// Service error code, set when the queue rejected the message.
    pub error_code: Option<String>,
}

impl SendReceipt {
    /// Error code, ignoring empty strings.
    pub fn rejection(&self) -> Option<&str> {
        self.error_code.as_deref().filter(|c| !c.is_empty())
    }
}

/// A dequeued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Message id.
    pub message_id: String,
    /// Message body as stored.
    pub text: String,
}

/// A table row keyed by partition and row key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntity {
    /// Partition key.
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    /// Row key.
    #[serde(rename = "RowKey")]
    pub row_key: String,
}

/// Metadata returned by a table insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct TableInsertResult {
    /// Entity tag of the new row.
    #[serde(rename = ".metadata")]
    pub metadata: EntityMetadata,
}

/// Entity metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct EntityMetadata {
    /// Entity tag, if the service returned one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl TableInsertResult {
    /// Insert result carrying an entity tag.
    pub fn with_etag(etag: Option<String>) -> Self {
        Self {
            metadata: EntityMetadata { etag },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> NewService {
        NewService::try_new("42", "Test", "AgID", "01234567890", "IT").unwrap()
    }

    #[test]
    fn new_service_serializes_with_wire_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["serviceId"], "42");
        assert_eq!(json["organizationFiscalCode"], "01234567890");
        assert_eq!(json["authorizedCIDRs"], serde_json::json!([]));
        assert_eq!(json["serviceMetadata"]["scope"], "NATIONAL");
        assert_eq!(json["serviceMetadata"]["tokenName"], "TOKEN_NAME");
        assert_eq!(json["isVisible"], true);
    }

    #[test]
    fn new_service_rejects_bad_fiscal_code() {
        let err = NewService::try_new("42", "Test", "AgID", "0123", "IT").unwrap_err();
        assert_eq!(err.field, "organizationFiscalCode");
    }

    #[test]
    fn new_service_rejects_empty_id() {
        let err = NewService::try_new(" ", "Test", "AgID", "01234567890", "IT").unwrap_err();
        assert_eq!(err.field, "serviceId");
    }

    #[test]
    fn service_record_id_embeds_version() {
        let record = ServiceRecord::first_version(sample());
        assert_eq!(record.id, "42-0000000000000000");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["serviceId"], "42");
        assert_eq!(json["version"], 0);
    }

    #[test]
    fn table_entity_uses_pascal_case_keys() {
        let entity = TableEntity {
            partition_key: "TEST".to_string(),
            row_key: "1".to_string(),
        };
        let json = serde_json::to_string(&entity).unwrap();
        assert_eq!(json, r#"{"PartitionKey":"TEST","RowKey":"1"}"#);
    }

    #[test]
    fn empty_error_code_is_not_a_rejection() {
        let receipt = SendReceipt {
            message_id: "m".to_string(),
            error_code: Some(String::new()),
        };
        assert_eq!(receipt.rejection(), None);
    }
}
