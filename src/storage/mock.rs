use super::BlobStore;
use crate::models::{BlobEntry, BlobKind, BlobListing, StoredBlobRef};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Clone)]
pub struct MockBlobStore {
    blobs: Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>,
    base_url: String,
    put_count: Arc<Mutex<usize>>,
    get_count: Arc<Mutex<usize>>,
    should_fail: Arc<Mutex<bool>>,
    listing_supported: bool,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(Mutex::new(HashMap::new())),
            base_url: "https://mock-aggregator.example.com/v1/blobs".to_string(),
            put_count: Arc::new(Mutex::new(0)),
            get_count: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
            listing_supported: true,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_blob(self, blob_id: String, content: Vec<u8>, content_type: &str) -> Self {
        self.blobs
            .lock()
            .unwrap()
            .insert(blob_id, (content, content_type.to_string()));
        self
    }

    /// Make every subsequent put fail with a storage error.
    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Answer `list` like a backend without an enumeration primitive.
    pub fn with_listing_supported(mut self, supported: bool) -> Self {
        self.listing_supported = supported;
        self
    }

    pub fn get_put_count(&self) -> usize {
        *self.put_count.lock().unwrap()
    }

    pub fn get_get_count(&self) -> usize {
        *self.get_count.lock().unwrap()
    }

    pub fn get_blobs(&self) -> HashMap<String, Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .iter()
            .map(|(id, (data, _))| (id.clone(), data.clone()))
            .collect()
    }
}

/// Lock shared state, turning a poisoned mutex into an internal error.
///
/// This store also backs the development `memory` backend, where a panic in
/// one request must not take down later ones.
fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::Internal("Memory store lock poisoned".to_string()))
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put(&self, data: &[u8], content_type: &str) -> Result<StoredBlobRef> {
        *lock(&self.put_count)? += 1;

        if *lock(&self.should_fail)? {
            return Err(Error::Storage("Mock storage failure".to_string()));
        }

        let blob_id = Uuid::new_v4().simple().to_string();
        let object_id = format!("0x{}", Uuid::new_v4().simple());
        lock(&self.blobs)?.insert(blob_id.clone(), (data.to_vec(), content_type.to_string()));

        Ok(StoredBlobRef::new(blob_id).with_object_id(object_id))
    }

    async fn get(&self, blob_id: &str) -> Result<Vec<u8>> {
        *lock(&self.get_count)? += 1;

        match lock(&self.blobs)?.get(blob_id) {
            Some((data, _)) => Ok(data.clone()),
            None => Err(Error::NotFound(format!("Blob '{}' not found", blob_id))),
        }
    }

    async fn blob_url(&self, blob_id: &str) -> Result<String> {
        if lock(&self.blobs)?.contains_key(blob_id) {
            Ok(format!("{}/{}", self.base_url, blob_id))
        } else {
            Err(Error::NotFound(format!("Blob '{}' not found", blob_id)))
        }
    }

    async fn list(&self) -> Result<BlobListing> {
        if !self.listing_supported {
            return Ok(BlobListing::Unsupported {
                reason: "Mock store configured without listing".to_string(),
            });
        }

        let entries = lock(&self.blobs)?
            .iter()
            .map(|(id, (data, content_type))| BlobEntry {
                blob_id: id.clone(),
                kind: BlobKind::from_content_type(content_type),
                size_bytes: data.len() as u64,
                modified_at: None,
            })
            .collect();
        Ok(BlobListing::Supported(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_store_round_trip() {
        let store = MockBlobStore::new();

        let blob = store.put(b"<svg/>", "image/svg+xml").await.unwrap();
        assert!(blob.object_id.is_some());
        assert_eq!(store.get_put_count(), 1);

        assert_eq!(store.get(&blob.blob_id).await.unwrap(), b"<svg/>".to_vec());
        assert_eq!(store.get_get_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_store_blob_url() {
        let store = MockBlobStore::new()
            .with_base_url("https://agg.test/v1/blobs".to_string())
            .with_blob("abc".to_string(), b"data".to_vec(), "image/png");

        assert_eq!(
            store.blob_url("abc").await.unwrap(),
            "https://agg.test/v1/blobs/abc"
        );
        assert!(matches!(
            store.blob_url("missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_store_failure() {
        let store = MockBlobStore::new().with_failure(true);
        let err = store.put(b"x", "text/plain").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(store.get_blobs().is_empty());
    }

    #[tokio::test]
    async fn test_poisoned_store_returns_internal_error() {
        let store =
            MockBlobStore::new().with_blob("abc".to_string(), b"data".to_vec(), "image/png");

        let blobs = store.blobs.clone();
        let result = std::thread::spawn(move || {
            let _guard = blobs.lock().unwrap();
            panic!("request panicked while holding the store lock");
        })
        .join();
        assert!(result.is_err());

        assert!(matches!(store.get("abc").await, Err(Error::Internal(_))));
        assert!(matches!(
            store.put(b"x", "text/plain").await,
            Err(Error::Internal(_))
        ));
        assert!(matches!(store.blob_url("abc").await, Err(Error::Internal(_))));
        assert!(matches!(store.list().await, Err(Error::Internal(_))));
    }

    #[tokio::test]
    async fn test_mock_store_read_missing_blob() {
        let store = MockBlobStore::new();
        let result = store.get("missing").await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }
}
