use super::BlobStore;
use crate::models::{BlobListing, StoredBlobRef};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;

const DEFAULT_RETRIES: usize = 3;
const DEFAULT_RETRY_FACTOR_MS: u64 = 250;

/// Walrus publisher/aggregator HTTP client.
///
/// Writes go to the publisher, reads to the aggregator. Connection failures
/// and timeouts are retried with exponential backoff; HTTP error statuses are
/// returned as-is.
pub struct WalrusStore {
    client: Client,
    publisher_url: String,
    aggregator_url: String,
    epochs: u32,
    retries: usize,
    retry_factor_ms: u64,
}

impl WalrusStore {
    pub fn new(
        publisher_url: String,
        aggregator_url: String,
        epochs: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            publisher_url: publisher_url.trim_end_matches('/').to_string(),
            aggregator_url: aggregator_url.trim_end_matches('/').to_string(),
            epochs,
            retries: DEFAULT_RETRIES,
            retry_factor_ms: DEFAULT_RETRY_FACTOR_MS,
        })
    }

    pub fn with_retries(mut self, retries: usize, factor: Duration) -> Self {
        self.retries = retries;
        self.retry_factor_ms = factor.as_millis() as u64;
        self
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor(self.retry_factor_ms)
            .max_delay(Duration::from_secs(5))
            .take(self.retries)
    }

    fn blob_endpoint(&self, blob_id: &str) -> String {
        format!("{}/v1/blobs/{}", self.aggregator_url, blob_id)
    }

    async fn send_put(&self, data: &[u8]) -> Result<Value> {
        let url = format!("{}/v1/blobs", self.publisher_url);
        let response = self
            .client
            .put(&url)
            .query(&[("epochs", self.epochs)])
            .body(data.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Walrus publisher error (status {}): {}", status, error_text);
            return Err(Error::Storage(format!(
                "Walrus publisher error (status {}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Storage(format!("Failed to parse Walrus publisher response: {}", e)))
    }

    async fn send_get(&self, blob_id: &str) -> Result<Vec<u8>> {
        let response = self.client.get(self.blob_endpoint(blob_id)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(not_found(blob_id)),
            status if !status.is_success() => {
                let error_text = response.text().await.unwrap_or_default();
                Err(Error::Storage(format!(
                    "Walrus aggregator error (status {}): {}",
                    status, error_text
                )))
            }
            _ => Ok(response
                .bytes()
                .await
                .map_err(|e| Error::Storage(format!("Failed to read blob body: {}", e)))?
                .to_vec()),
        }
    }

    async fn send_head(&self, blob_id: &str) -> Result<()> {
        let response = self.client.head(self.blob_endpoint(blob_id)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(not_found(blob_id)),
            status if !status.is_success() => Err(Error::Storage(format!(
                "Walrus aggregator error (status {})",
                status
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl BlobStore for WalrusStore {
    async fn put(&self, data: &[u8], content_type: &str) -> Result<StoredBlobRef> {
        tracing::debug!(
            "Uploading {} bytes ({}) to Walrus for {} epochs",
            data.len(),
            content_type,
            self.epochs
        );

        let response = RetryIf::spawn(self.retry_strategy(), || self.send_put(data), is_transient)
            .await
            .map_err(|e| transport_to_storage(e, "Failed to upload to Walrus"))?;

        let blob = PublishOutcome::parse(response).into_blob_ref()?;
        tracing::info!("Stored blob {} on Walrus", blob.blob_id);
        Ok(blob)
    }

    async fn get(&self, blob_id: &str) -> Result<Vec<u8>> {
        if !is_valid_blob_id(blob_id) {
            return Err(not_found(blob_id));
        }

        RetryIf::spawn(self.retry_strategy(), || self.send_get(blob_id), is_transient)
            .await
            .map_err(|e| transport_to_storage(e, "Failed to download from Walrus"))
    }

    async fn blob_url(&self, blob_id: &str) -> Result<String> {
        if !is_valid_blob_id(blob_id) {
            return Err(not_found(blob_id));
        }

        RetryIf::spawn(self.retry_strategy(), || self.send_head(blob_id), is_transient)
            .await
            .map_err(|e| transport_to_storage(e, "Failed to look up Walrus blob"))?;

        Ok(self.blob_endpoint(blob_id))
    }

    async fn list(&self) -> Result<BlobListing> {
        Ok(BlobListing::Unsupported {
            reason: "Walrus has no blob listing primitive".to_string(),
        })
    }
}

/// Outcome of a publisher `PUT /v1/blobs` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    NewlyCreated { blob_id: String, object_id: String },
    AlreadyCertified { blob_id: String },
    Unknown(Value),
}

#[derive(Debug, Deserialize)]
enum PublishResponse {
    #[serde(rename = "newlyCreated")]
    NewlyCreated {
        #[serde(rename = "blobObject")]
        blob_object: BlobObject,
    },
    #[serde(rename = "alreadyCertified")]
    AlreadyCertified {
        #[serde(rename = "blobId")]
        blob_id: String,
    },
}

#[derive(Debug, Deserialize)]
struct BlobObject {
    id: String,
    #[serde(rename = "blobId")]
    blob_id: String,
}

impl PublishOutcome {
    pub fn parse(value: Value) -> Self {
        match serde_json::from_value::<PublishResponse>(value.clone()) {
            Ok(PublishResponse::NewlyCreated { blob_object }) => PublishOutcome::NewlyCreated {
                blob_id: blob_object.blob_id,
                object_id: blob_object.id,
            },
            Ok(PublishResponse::AlreadyCertified { blob_id }) => {
                PublishOutcome::AlreadyCertified { blob_id }
            }
            Err(_) => PublishOutcome::Unknown(value),
        }
    }

    pub fn into_blob_ref(self) -> Result<StoredBlobRef> {
        match self {
            PublishOutcome::NewlyCreated { blob_id, object_id } => {
                Ok(StoredBlobRef::new(blob_id).with_object_id(object_id))
            }
            PublishOutcome::AlreadyCertified { blob_id } => Ok(StoredBlobRef::new(blob_id)),
            PublishOutcome::Unknown(value) => Err(Error::Storage(format!(
                "Unrecognized Walrus publisher response: {}",
                value
            ))),
        }
    }
}

/// Walrus blob ids are unpadded URL-safe base64.
fn is_valid_blob_id(blob_id: &str) -> bool {
    !blob_id.is_empty()
        && blob_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn not_found(blob_id: &str) -> Error {
    Error::NotFound(format!("Blob '{}' not found", blob_id))
}

fn is_transient(err: &Error) -> bool {
    match err {
        Error::Http(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

fn transport_to_storage(err: Error, context: &str) -> Error {
    match err {
        Error::Http(e) => {
            tracing::error!("{}: {}", context, e);
            Error::Storage(format!("{}: {}", context, e))
        }
        other => other,
    }
}
