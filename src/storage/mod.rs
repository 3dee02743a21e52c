//! Blob storage for generated artifacts and uploaded images
//!
//! Walrus (decentralized, content-addressed) is the primary backend; a local
//! filesystem store and an in-memory mock sit behind the same trait.

pub mod local;
pub mod mock;
pub mod walrus;

pub use local::LocalStore;
pub use mock::MockBlobStore;
pub use walrus::WalrusStore;

use crate::models::{BlobListing, StoredBlobRef};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, data: &[u8], content_type: &str) -> Result<StoredBlobRef>;

    /// Fetch a blob. Unknown ids fail with `Error::NotFound`.
    async fn get(&self, blob_id: &str) -> Result<Vec<u8>>;

    /// Public URL for an existing blob. Unknown ids fail with `Error::NotFound`.
    async fn blob_url(&self, blob_id: &str) -> Result<String>;

    async fn list(&self) -> Result<BlobListing>;
}
