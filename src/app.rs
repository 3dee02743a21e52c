//! Request mediation: validate input, drive the generator, chat session and
//! blob store in turn, and shape what comes back.

use crate::ai::mime::detect_image_mime;
use crate::ai::{ArtifactGenerator, ConversationSession, GeminiChatSession, GeminiSvgGenerator};
use crate::config::{Config, StorageBackend};
use crate::image::ImageAnalyzer;
use crate::models::{
    AnalyzedImage, BlobListing, BlobUrlResponse, ChatCompletion, ConversationTurn,
    GeneratedArtifact, ImageContext, ImageUpload, Metadata, PersistedArtifact, StoredBlobRef,
};
use crate::storage::{BlobStore, LocalStore, MockBlobStore, WalrusStore};
use crate::{prompts, Error, Result};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

/// Largest request body accepted by the HTTP layer.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub const ALLOWED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];

const SVG_CONTENT_TYPE: &str = "image/svg+xml";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Which stored representation a download asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    Svg,
    Metadata,
    Image,
}

#[derive(Debug, Clone)]
pub enum Download {
    Svg(String),
    Metadata(Value),
    Image {
        bytes: Vec<u8>,
        content_type: &'static str,
    },
}

/// Coordinates generation, analysis, chat and storage for each request.
pub struct App {
    generator: Box<dyn ArtifactGenerator>,
    store: Box<dyn BlobStore>,
    chat: Box<dyn ConversationSession>,
    analyzer: ImageAnalyzer,
    temp_dir: PathBuf,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub generator: Box<dyn ArtifactGenerator>,
    pub store: Box<dyn BlobStore>,
    pub chat: Box<dyn ConversationSession>,
}

impl App {
    /// Build an app from concrete service dependencies.
    ///
    /// Upload scratch files are created under `temp_dir`.
    pub fn with_services(services: AppServices, temp_dir: PathBuf) -> Self {
        Self {
            generator: services.generator,
            store: services.store,
            chat: services.chat,
            analyzer: ImageAnalyzer::new(),
            temp_dir,
        }
    }

    /// Construct the production service graph from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.temp_dir).await?;

        // One connection pool shared by the Gemini clients.
        let http_client = reqwest::Client::new();

        info!("Gemini model: {}", config.gemini_model);
        let generator = GeminiSvgGenerator::new_with_client(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.generation_timeout,
            http_client.clone(),
        );
        let chat = GeminiChatSession::new_with_client(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.generation_timeout,
            http_client,
        );

        let store: Box<dyn BlobStore> = match config.storage_backend {
            StorageBackend::Walrus => {
                info!(
                    "Storage backend: Walrus (publisher: {}, aggregator: {}, epochs: {})",
                    config.walrus_publisher_url, config.walrus_aggregator_url, config.walrus_epochs
                );
                Box::new(WalrusStore::new(
                    config.walrus_publisher_url.clone(),
                    config.walrus_aggregator_url.clone(),
                    config.walrus_epochs,
                    config.storage_timeout,
                )?)
            }
            StorageBackend::Local => {
                info!("Storage backend: local ({})", config.output_dir.display());
                Box::new(LocalStore::new(&config.output_dir)?)
            }
            StorageBackend::Memory => {
                warn!("Storage backend: in-memory, blobs are lost on restart");
                Box::new(MockBlobStore::new())
            }
        };

        Ok(Self::with_services(
            AppServices {
                generator: Box::new(generator),
                store,
                chat: Box::new(chat),
            },
            config.temp_dir.clone(),
        ))
    }

    pub async fn generate_from_text(&self, prompt: Option<&str>) -> Result<GeneratedArtifact> {
        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::Validation("Prompt is required".to_string()))?;

        info!("Generating SVG from prompt ({} chars)", prompt.len());
        self.generator.generate_from_prompt(prompt).await
    }

    pub async fn generate_from_image(
        &self,
        upload: Option<ImageUpload>,
        prompt: Option<&str>,
    ) -> Result<GeneratedArtifact> {
        let (upload, filename) = validate_upload(upload)?;
        let prompt = prompt.map(str::trim).filter(|p| !p.is_empty());

        std::fs::create_dir_all(&self.temp_dir)?;
        // Removed on drop, whichever way this function returns.
        let temp = tempfile::Builder::new()
            .prefix("temp_")
            .suffix(&format!("_{}", filename))
            .tempfile_in(&self.temp_dir)?;
        tokio::fs::write(temp.path(), &upload.bytes).await?;

        info!("Generating SVG from image {}", filename);
        let result = self.generator.generate_from_image(temp.path(), prompt).await;
        drop(temp);

        let mut artifact = result.inspect_err(|e| warn!("Image generation failed: {}", e))?;
        artifact
            .metadata
            .insert("source_filename".into(), Value::from(filename));
        Ok(artifact)
    }

    /// Store the markup, then the metadata annotated with both references.
    pub async fn persist(&self, artifact: GeneratedArtifact) -> Result<PersistedArtifact> {
        let GeneratedArtifact {
            content,
            mut metadata,
        } = artifact;

        let svg = self
            .store
            .put(content.as_bytes(), SVG_CONTENT_TYPE)
            .await
            .map_err(into_storage)?;
        info!("Stored SVG blob {}", svg.blob_id);
        insert_refs(&mut metadata, "svg", &svg);

        let metadata_blob = self
            .store
            .put(&serde_json::to_vec_pretty(&metadata)?, JSON_CONTENT_TYPE)
            .await
            .map_err(into_storage)?;
        info!("Stored metadata blob {}", metadata_blob.blob_id);
        insert_refs(&mut metadata, "metadata", &metadata_blob);

        let svg_url = self
            .store
            .blob_url(&svg.blob_id)
            .await
            .map_err(into_storage)?;

        Ok(PersistedArtifact {
            svg,
            metadata_blob,
            svg_url,
            metadata,
        })
    }

    pub async fn resolve_download(&self, blob_id: &str, kind: DownloadKind) -> Result<Download> {
        let bytes = self.store.get(blob_id).await?;

        match kind {
            DownloadKind::Svg => String::from_utf8(bytes).map(Download::Svg).map_err(|_| {
                Error::Storage(format!("Blob '{}' is not valid UTF-8 markup", blob_id))
            }),
            DownloadKind::Metadata => serde_json::from_slice(&bytes)
                .map(Download::Metadata)
                .map_err(|e| {
                    Error::Storage(format!("Blob '{}' is not valid JSON: {}", blob_id, e))
                }),
            DownloadKind::Image => Ok(Download::Image {
                content_type: detect_image_mime(&bytes),
                bytes,
            }),
        }
    }

    pub async fn blob_url(&self, blob_id: &str) -> Result<BlobUrlResponse> {
        let svg_url = self.store.blob_url(blob_id).await?;
        Ok(BlobUrlResponse {
            blob_id: blob_id.to_string(),
            svg_url,
        })
    }

    pub async fn chat(
        &self,
        message: Option<&str>,
        image_context: Option<&ImageContext>,
    ) -> Result<ChatCompletion> {
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| Error::Validation("Message is required".to_string()))?;

        let text = match image_context {
            Some(ctx) => prompts::render_image_chat(message, ctx),
            None => prompts::render_chat(message),
        };

        self.chat.append_and_complete(&text).await
    }

    pub async fn chat_history(&self) -> Vec<ConversationTurn> {
        self.chat.history().await
    }

    pub async fn reset_chat(&self) {
        self.chat.reset().await;
        info!("Chat session reset");
    }

    pub async fn list_generated_artifacts(&self) -> Result<BlobListing> {
        self.store.list().await
    }

    /// Describe an upload, then store the original bytes and the description.
    pub async fn analyze_image(&self, upload: Option<ImageUpload>) -> Result<AnalyzedImage> {
        let (upload, filename) = validate_upload(upload)?;

        let analysis = self.analyzer.analyze(&upload.bytes, &filename).await?;
        info!(
            "Analyzed {}: {} {}x{}",
            filename, analysis.format, analysis.width, analysis.height
        );
        let mut metadata = analysis.into_metadata();

        let image = self
            .store
            .put(&upload.bytes, detect_image_mime(&upload.bytes))
            .await
            .map_err(into_storage)?;
        info!("Stored image blob {}", image.blob_id);
        insert_refs(&mut metadata, "image", &image);

        let image_url = self
            .store
            .blob_url(&image.blob_id)
            .await
            .map_err(into_storage)?;

        let metadata_blob = self
            .store
            .put(&serde_json::to_vec_pretty(&metadata)?, JSON_CONTENT_TYPE)
            .await
            .map_err(into_storage)?;
        insert_refs(&mut metadata, "metadata", &metadata_blob);

        Ok(AnalyzedImage {
            image,
            metadata_blob,
            image_url,
            metadata,
        })
    }
}

/// Check an upload before anything touches the filesystem or a collaborator.
fn validate_upload(upload: Option<ImageUpload>) -> Result<(ImageUpload, String)> {
    let upload = upload.ok_or_else(|| Error::Validation("No image file provided".to_string()))?;
    if upload.filename.trim().is_empty() {
        return Err(Error::Validation("No image file selected".to_string()));
    }
    if !has_allowed_extension(&upload.filename) {
        return Err(Error::Validation(format!(
            "Invalid file type. Allowed types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    let filename = sanitize_filename(&upload.filename);
    Ok((upload, filename))
}

fn has_allowed_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduce a client-supplied name to a safe single path component.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn insert_refs(metadata: &mut Metadata, prefix: &str, blob: &StoredBlobRef) {
    metadata.insert(
        format!("{}_blob_id", prefix),
        Value::from(blob.blob_id.clone()),
    );
    metadata.insert(
        format!("{}_object_id", prefix),
        blob.object_id.clone().map_or(Value::Null, Value::from),
    );
}

/// Surface any store failure as a storage error, keeping its message.
fn into_storage(err: Error) -> Error {
    match err {
        Error::Storage(message) => Error::Storage(message),
        other => Error::Storage(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockChatSession, MockGenerator};
    use crate::models::ImageSize;
    use tempfile::TempDir;

    struct TestApp {
        app: App,
        generator: MockGenerator,
        store: MockBlobStore,
        chat: MockChatSession,
        temp_dir: TempDir,
    }

    fn build_test_app_with(generator: MockGenerator, store: MockBlobStore) -> TestApp {
        let temp_dir = TempDir::new().unwrap();
        let chat = MockChatSession::new();
        let app = App::with_services(
            AppServices {
                generator: Box::new(generator.clone()),
                store: Box::new(store.clone()),
                chat: Box::new(chat.clone()),
            },
            temp_dir.path().to_path_buf(),
        );
        TestApp {
            app,
            generator,
            store,
            chat,
            temp_dir,
        }
    }

    fn build_test_app() -> TestApp {
        build_test_app_with(MockGenerator::new(), MockBlobStore::new())
    }

    fn png_upload(filename: &str) -> ImageUpload {
        let img = image::RgbaImage::from_pixel(10, 10, image::Rgba([0, 0, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        ImageUpload {
            filename: filename.to_string(),
            bytes,
        }
    }

    fn temp_dir_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_blank_prompt_never_reaches_generator() {
        let t = build_test_app();

        for prompt in [None, Some(""), Some("   \n\t")] {
            let err = t.app.generate_from_text(prompt).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
        assert_eq!(t.generator.get_call_count(), 0);
        assert_eq!(t.store.get_put_count(), 0);
    }

    #[tokio::test]
    async fn test_text_generation_and_persist() {
        let t = build_test_app();

        let artifact = t
            .app
            .generate_from_text(Some("a red circle"))
            .await
            .unwrap();
        assert_eq!(artifact.metadata["type"], "text_to_artifact");

        let persisted = t.app.persist(artifact).await.unwrap();
        assert_eq!(t.store.get_put_count(), 2);
        assert_eq!(persisted.metadata["svg_blob_id"], persisted.svg.blob_id.as_str());
        assert_eq!(
            persisted.metadata["metadata_blob_id"],
            persisted.metadata_blob.blob_id.as_str()
        );
        assert!(persisted.svg_url.ends_with(&persisted.svg.blob_id));

        // The stored metadata carries the SVG refs but not its own.
        let stored = t
            .app
            .resolve_download(&persisted.metadata_blob.blob_id, DownloadKind::Metadata)
            .await
            .unwrap();
        let Download::Metadata(stored) = stored else {
            panic!("expected metadata download");
        };
        assert_eq!(stored["svg_blob_id"], persisted.svg.blob_id.as_str());
        assert!(stored.get("metadata_blob_id").is_none());
    }

    #[tokio::test]
    async fn test_invalid_extension_rejected_before_temp_file() {
        let t = build_test_app();

        for name in ["notes.txt", "noextension", "archive.png.zip", ""] {
            let err = t
                .app
                .generate_from_image(Some(png_upload(name)), None)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{:?}", name);
        }
        let err = t.app.generate_from_image(None, None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert_eq!(t.generator.get_call_count(), 0);
        assert!(t.generator.get_image_paths().is_empty());
        assert!(temp_dir_is_empty(&t.temp_dir));
    }

    #[tokio::test]
    async fn test_extension_check_is_case_insensitive() {
        let t = build_test_app();
        let artifact = t
            .app
            .generate_from_image(Some(png_upload("PHOTO.JPEG")), Some("  "))
            .await
            .unwrap();

        assert_eq!(artifact.metadata["type"], "image_to_artifact");
        assert_eq!(artifact.metadata["source_filename"], "PHOTO.JPEG");
    }

    #[tokio::test]
    async fn test_temp_file_removed_after_success() {
        let t = build_test_app();

        t.app
            .generate_from_image(Some(png_upload("cat.png")), Some("make it blue"))
            .await
            .unwrap();

        let paths = t.generator.get_image_paths();
        assert_eq!(paths.len(), 1);
        let file_name = paths[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("temp_"));
        assert!(file_name.ends_with("_cat.png"));
        assert!(!paths[0].exists());
        assert!(temp_dir_is_empty(&t.temp_dir));
    }

    #[tokio::test]
    async fn test_temp_file_removed_after_generator_failure() {
        let t = build_test_app_with(
            MockGenerator::new().with_failure(true),
            MockBlobStore::new(),
        );

        let err = t
            .app
            .generate_from_image(Some(png_upload("cat.png")), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Generation(_)));
        assert_eq!(t.generator.get_image_paths().len(), 1);
        assert!(temp_dir_is_empty(&t.temp_dir));
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_message() {
        let t = build_test_app_with(MockGenerator::new(), MockBlobStore::new().with_failure(true));
        let artifact = t.app.generate_from_text(Some("x")).await.unwrap();

        let err = t.app.persist(artifact).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(err.to_string().contains("Mock storage failure"));
    }

    #[tokio::test]
    async fn test_download_errors() {
        let store = MockBlobStore::new()
            .with_blob("binary".to_string(), vec![0xFF, 0xFE, 0x00], "image/svg+xml")
            .with_blob("not-json".to_string(), b"<svg/>".to_vec(), "application/json");
        let t = build_test_app_with(MockGenerator::new(), store);

        let err = t
            .app
            .resolve_download("unknown-id", DownloadKind::Svg)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = t
            .app
            .resolve_download("binary", DownloadKind::Svg)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        let err = t
            .app
            .resolve_download("not-json", DownloadKind::Metadata)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_chat_requires_message() {
        let t = build_test_app();
        let err = t.app.chat(Some("  "), None).await.unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(t.chat.get_sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_chat_without_context_addresses_persona() {
        let t = build_test_app();
        let completion = t.app.chat(Some("How do I shade?"), None).await.unwrap();

        assert_eq!(
            t.chat.get_sent_messages(),
            vec!["Mentor, How do I shade?".to_string()]
        );
        assert_eq!(completion.turn_count, 4);
        assert_eq!(t.app.chat_history().await.len(), 2);
    }

    #[tokio::test]
    async fn test_chat_with_partial_context_uses_placeholders() {
        let t = build_test_app();
        let ctx = ImageContext {
            filename: Some("x.png".to_string()),
            size: Some(ImageSize {
                width: Some(640),
                height: None,
            }),
            ..Default::default()
        };

        t.app.chat(Some("thoughts?"), Some(&ctx)).await.unwrap();

        let sent = t.chat.get_sent_messages();
        assert!(sent[0].contains("x.png"));
        assert!(sent[0].contains("640 x N/A"));
        assert!(sent[0].contains("thoughts?"));
    }

    #[tokio::test]
    async fn test_reset_chat_clears_history() {
        let t = build_test_app();
        t.app.chat(Some("hello"), None).await.unwrap();

        t.app.reset_chat().await;
        assert!(t.app.chat_history().await.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_image_stores_bytes_and_metadata() {
        let t = build_test_app();
        let upload = png_upload("red.png");
        let original = upload.bytes.clone();

        let analyzed = t.app.analyze_image(Some(upload)).await.unwrap();

        assert_eq!(analyzed.metadata["width"], 10);
        assert_eq!(analyzed.metadata["height"], 10);
        assert_eq!(analyzed.metadata["format"], "PNG");
        assert_eq!(
            analyzed.metadata["image_blob_id"],
            analyzed.image.blob_id.as_str()
        );
        assert!(analyzed.image_url.ends_with(&analyzed.image.blob_id));

        let download = t
            .app
            .resolve_download(&analyzed.image.blob_id, DownloadKind::Image)
            .await
            .unwrap();
        let Download::Image {
            bytes,
            content_type,
        } = download
        else {
            panic!("expected image download");
        };
        assert_eq!(bytes, original);
        assert_eq!(content_type, "image/png");
    }

    #[tokio::test]
    async fn test_analyze_rejects_undecodable_upload() {
        let t = build_test_app();
        let upload = ImageUpload {
            filename: "fake.png".to_string(),
            bytes: b"not an image".to_vec(),
        };

        let err = t.app.analyze_image(Some(upload)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(t.store.get_put_count(), 0);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("cat.png"), "cat.png");
        assert_eq!(sanitize_filename("../../etc/passwd.png"), "passwd.png");
        assert_eq!(sanitize_filename("C:\\Users\\me\\my pic.jpg"), "my_pic.jpg");
        assert_eq!(sanitize_filename(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("..."), "upload");
    }
}
