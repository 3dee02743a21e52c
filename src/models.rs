//! Data models and structures
//!
//! Defines the artifacts, storage references, chat turns and HTTP payloads
//! exchanged between the request mediator and its collaborators.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Descriptive JSON record attached to every generated artifact or image.
pub type Metadata = serde_json::Map<String, Value>;

/// Generated SVG markup plus its metadata. Immutable once produced.
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub content: String,
    pub metadata: Metadata,
}

/// Identifiers returned by a [`crate::storage::BlobStore`] after a successful put.
///
/// Opaque to the mediator: only handed back to callers or into retrieval calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlobRef {
    pub blob_id: String,
    pub object_id: Option<String>,
}

impl StoredBlobRef {
    pub fn new(blob_id: impl Into<String>) -> Self {
        Self {
            blob_id: blob_id.into(),
            object_id: None,
        }
    }

    pub fn with_object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }
}

/// Content ref, metadata ref and public URL of an artifact after storage.
#[derive(Debug, Clone)]
pub struct PersistedArtifact {
    pub svg: StoredBlobRef,
    pub metadata_blob: StoredBlobRef,
    pub svg_url: String,
    /// Generator metadata plus the `svg_*` and `metadata_*` references.
    pub metadata: Metadata,
}

/// An analyzed upload after its bytes and metadata were stored.
#[derive(Debug, Clone)]
pub struct AnalyzedImage {
    pub image: StoredBlobRef,
    pub metadata_blob: StoredBlobRef,
    pub image_url: String,
    pub metadata: Metadata,
}

/// An uploaded image as received from a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletion {
    pub reply: String,
    pub turn_count: usize,
}

/// Image details a client may attach to a chat message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageContext {
    pub filename: Option<String>,
    pub size: Option<ImageSize>,
    pub format: Option<String>,
    pub file_size: Option<u64>,
    pub blob_id: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Facts extracted from an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub filename: String,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub mode: String,
    pub file_size: usize,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobKind {
    Svg,
    Metadata,
    Image,
    Other,
}

impl BlobKind {
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type {
            "image/svg+xml" => BlobKind::Svg,
            "application/json" => BlobKind::Metadata,
            ct if ct.starts_with("image/") => BlobKind::Image,
            _ => BlobKind::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobEntry {
    pub blob_id: String,
    pub kind: BlobKind,
    pub size_bytes: u64,
    pub modified_at: Option<String>,
}

/// Result of asking a store to enumerate its blobs.
///
/// Backends without a listing primitive answer `Unsupported` so callers can
/// tell "nothing stored" apart from "cannot list".
#[derive(Debug, Clone)]
pub enum BlobListing {
    Supported(Vec<BlobEntry>),
    Unsupported { reason: String },
}

// HTTP request/response payloads

#[derive(Debug, Deserialize)]
pub struct TextGenerationRequest {
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub image_context: Option<ImageContext>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResponse {
    pub success: bool,
    pub svg_blob_id: String,
    pub svg_object_id: Option<String>,
    pub svg_url: String,
    pub metadata_blob_id: String,
    pub metadata_object_id: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub image_url: String,
    pub image_blob_id: String,
    pub image_object_id: Option<String>,
    pub metadata_blob_id: String,
    pub metadata_object_id: Option<String>,
    pub metadata: Metadata,
}

impl From<PersistedArtifact> for GenerationResponse {
    fn from(persisted: PersistedArtifact) -> Self {
        Self {
            success: true,
            svg_blob_id: persisted.svg.blob_id,
            svg_object_id: persisted.svg.object_id,
            svg_url: persisted.svg_url,
            metadata_blob_id: persisted.metadata_blob.blob_id,
            metadata_object_id: persisted.metadata_blob.object_id,
            metadata: persisted.metadata,
        }
    }
}

impl From<AnalyzedImage> for AnalysisResponse {
    fn from(analyzed: AnalyzedImage) -> Self {
        Self {
            success: true,
            image_url: analyzed.image_url,
            image_blob_id: analyzed.image.blob_id,
            image_object_id: analyzed.image.object_id,
            metadata_blob_id: analyzed.metadata_blob.blob_id,
            metadata_object_id: analyzed.metadata_blob.object_id,
            metadata: analyzed.metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlobUrlResponse {
    pub blob_id: String,
    pub svg_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub message_id: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        let turn = ConversationTurn::assistant("hello");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));

        let deserialized: ConversationTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.role, Role::Assistant);
        assert_eq!(deserialized.content, "hello");
    }

    #[test]
    fn test_image_context_accepts_partial_fields() {
        let ctx: ImageContext = serde_json::from_str(r#"{"filename": "x.png"}"#).unwrap();
        assert_eq!(ctx.filename.as_deref(), Some("x.png"));
        assert!(ctx.size.is_none());
        assert!(ctx.file_size.is_none());
    }

    #[test]
    fn test_blob_kind_from_content_type() {
        assert_eq!(BlobKind::from_content_type("image/svg+xml"), BlobKind::Svg);
        assert_eq!(
            BlobKind::from_content_type("application/json"),
            BlobKind::Metadata
        );
        assert_eq!(BlobKind::from_content_type("image/png"), BlobKind::Image);
        assert_eq!(
            BlobKind::from_content_type("application/octet-stream"),
            BlobKind::Other
        );
    }

    #[test]
    fn test_stored_blob_ref_serializes_missing_object_id_as_null() {
        let blob = StoredBlobRef::new("abc");
        let json = serde_json::to_value(&blob).unwrap();
        assert_eq!(json["blob_id"], "abc");
        assert!(json["object_id"].is_null());
    }
}
