//! Queue service adapter.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::error::ProbeError;
use crate::storage::types::{ReceivedMessage, SendReceipt};
use crate::storage::QueueStore;

use super::{ensure_success, header, ms_date, sas_url, STORAGE_API_VERSION};

/// Largest batch the service hands out per receive call.
pub const MAX_BATCH: usize = 32;

static QUEUE_MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<QueueMessage>(.*?)</QueueMessage>").expect("valid regex"));
static MESSAGE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<MessageId>([^<]*)</MessageId>").expect("valid regex"));
static MESSAGE_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<MessageText>(.*?)</MessageText>").expect("valid regex"));

/// Queue service client.
#[derive(Debug, Clone)]
pub struct AzureQueueClient {
    http: reqwest::Client,
    base_url: String,
    sas: String,
}

impl AzureQueueClient {
    /// Create a client for the given service endpoint.
    pub fn new(http: reqwest::Client, base_url: String, sas: String) -> Self {
        Self { http, base_url, sas }
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Message id from a `Put Message` response body.
fn parse_message_id(body: &str) -> Option<String> {
    MESSAGE_ID.captures(body).map(|c| c[1].to_string())
}

/// Messages from a `Get Messages` response body.
fn parse_messages(body: &str) -> Vec<ReceivedMessage> {
    QUEUE_MESSAGE
        .captures_iter(body)
        .map(|block| {
            let inner = &block[1];
            ReceivedMessage {
                message_id: parse_message_id(inner).unwrap_or_default(),
                text: MESSAGE_TEXT
                    .captures(inner)
                    .map(|c| unescape_xml(&c[1]))
                    .unwrap_or_default(),
            }
        })
        .collect()
}

/// Receipt for a `Put Message` the service refused. `None` when the status
/// is a success or no error code came back.
fn rejection_receipt(
    status: reqwest::StatusCode,
    error_code: Option<String>,
) -> Option<SendReceipt> {
    if status.is_success() {
        return None;
    }
    error_code
        .filter(|code| !code.is_empty())
        .map(|code| SendReceipt {
            message_id: String::new(),
            error_code: Some(code),
        })
}

/// Receipt for an accepted `Put Message`.
fn accepted_receipt(body: &str) -> Result<SendReceipt, ProbeError> {
    let message_id = parse_message_id(body)
        .ok_or_else(|| ProbeError::Malformed("Put Message response has no MessageId".into()))?;
    Ok(SendReceipt {
        message_id,
        error_code: None,
    })
}

#[async_trait]
impl QueueStore for AzureQueueClient {
    #[instrument(skip_all, fields(queue = %queue))]
    async fn send(&self, queue: &str, text: &str) -> Result<SendReceipt, ProbeError> {
        let url = sas_url(&self.base_url, &format!("/{queue}/messages"), &[], &self.sas)?;
        let body = format!(
            "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            escape_xml(text)
        );

        let response = self
            .http
            .post(url)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-date", ms_date()?)
            .header("content-type", "application/xml")
            .body(body)
            .send()
            .await?;

        // The service reports rejections through x-ms-error-code.
        if let Some(receipt) =
            rejection_receipt(response.status(), header(&response, "x-ms-error-code"))
        {
            warn!(error_code = ?receipt.error_code, "queue rejected message");
            return Ok(receipt);
        }

        let body = ensure_success(response).await?.text().await?;
        accepted_receipt(&body)
    }

    #[instrument(skip_all, fields(queue = %queue, max = max))]
    async fn receive(&self, queue: &str, max: usize) -> Result<Vec<ReceivedMessage>, ProbeError> {
        let batch = max.clamp(1, MAX_BATCH).to_string();
        let url = sas_url(
            &self.base_url,
            &format!("/{queue}/messages"),
            &[("numofmessages", batch.as_str())],
            &self.sas,
        )?;

        let response = self
            .http
            .get(url)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-date", ms_date()?)
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;

        let messages = parse_messages(&body);
        debug!(received = messages.len(), "received messages");
        Ok(messages)
    }

    #[instrument(skip_all, fields(queue = %queue))]
    async fn clear(&self, queue: &str) -> Result<(), ProbeError> {
        let url = sas_url(&self.base_url, &format!("/{queue}/messages"), &[], &self.sas)?;

        let response = self
            .http
            .delete(url)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-date", ms_date()?)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}
