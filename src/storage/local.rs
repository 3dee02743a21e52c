use super::BlobStore;
use crate::models::{BlobEntry, BlobKind, BlobListing, StoredBlobRef};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SUBDIRS: [&str; 4] = ["svg", "metadata", "images", "blobs"];

/// Filesystem store laid out as `{root}/{svg,metadata,images,blobs}/{uuid}.{ext}`.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: &Path) -> Result<Self> {
        for subdir in SUBDIRS {
            std::fs::create_dir_all(root.join(subdir))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn extension_for(content_type: &str) -> &'static str {
        match content_type {
            "image/svg+xml" => "svg",
            "application/json" => "json",
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            "image/webp" => "webp",
            _ => "bin",
        }
    }

    fn subdir_for(extension: &str) -> &'static str {
        match extension {
            "svg" => "svg",
            "json" => "metadata",
            "png" | "jpg" | "gif" | "bmp" | "webp" => "images",
            _ => "blobs",
        }
    }

    fn kind_for(extension: &str) -> BlobKind {
        match Self::subdir_for(extension) {
            "svg" => BlobKind::Svg,
            "metadata" => BlobKind::Metadata,
            "images" => BlobKind::Image,
            _ => BlobKind::Other,
        }
    }

    /// Download route serving blobs of this extension.
    fn download_route_for(extension: &str) -> &'static str {
        match Self::kind_for(extension) {
            BlobKind::Svg => "svg",
            BlobKind::Metadata => "metadata",
            BlobKind::Image | BlobKind::Other => "image",
        }
    }

    /// Resolve an id to its file, refusing anything that is not `{stem}.{ext}`.
    fn path_for(&self, blob_id: &str) -> Option<PathBuf> {
        let (stem, extension) = blob_id.split_once('.')?;
        let safe = |part: &str| {
            !part.is_empty()
                && part
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        };
        if !safe(stem) || !safe(extension) {
            return None;
        }
        Some(self.root.join(Self::subdir_for(extension)).join(blob_id))
    }

    fn not_found(blob_id: &str) -> Error {
        Error::NotFound(format!("Blob '{}' not found", blob_id))
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn put(&self, data: &[u8], content_type: &str) -> Result<StoredBlobRef> {
        let extension = Self::extension_for(content_type);
        let blob_id = format!("{}.{}", Uuid::new_v4(), extension);
        let path = self.root.join(Self::subdir_for(extension)).join(&blob_id);

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", path.display(), e)))?;

        tracing::info!("Stored blob {} at {}", blob_id, path.display());
        Ok(StoredBlobRef::new(blob_id))
    }

    async fn get(&self, blob_id: &str) -> Result<Vec<u8>> {
        let path = self
            .path_for(blob_id)
            .ok_or_else(|| Self::not_found(blob_id))?;

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Self::not_found(blob_id)),
            Err(e) => Err(Error::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn blob_url(&self, blob_id: &str) -> Result<String> {
        let path = self
            .path_for(blob_id)
            .ok_or_else(|| Self::not_found(blob_id))?;

        if !tokio::fs::try_exists(&path).await? {
            return Err(Self::not_found(blob_id));
        }

        let extension = blob_id.rsplit('.').next().unwrap_or_default();
        Ok(format!(
            "/download/{}/{}",
            Self::download_route_for(extension),
            blob_id
        ))
    }

    async fn list(&self) -> Result<BlobListing> {
        let mut entries = Vec::new();

        for subdir in SUBDIRS {
            let mut dir = match tokio::fs::read_dir(self.root.join(subdir)).await {
                Ok(dir) => dir,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = dir.next_entry().await? {
                let metadata = entry.metadata().await?;
                if !metadata.is_file() {
                    continue;
                }
                let blob_id = entry.file_name().to_string_lossy().to_string();
                let extension = blob_id.rsplit('.').next().unwrap_or_default().to_string();
                entries.push(BlobEntry {
                    kind: Self::kind_for(&extension),
                    blob_id,
                    size_bytes: metadata.len(),
                    modified_at: metadata
                        .modified()
                        .ok()
                        .map(|t| DateTime::<Utc>::from(t).to_rfc3339()),
                });
            }
        }

        // RFC 3339 strings in UTC sort chronologically.
        entries.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(BlobListing::Supported(entries))
    }
}
