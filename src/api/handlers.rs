//! Request handlers. Each one unpacks the request, calls into [`App`] and
//! shapes the JSON reply; errors render through `IntoResponse for Error`.

use crate::app::{App, Download, DownloadKind};
use crate::models::{
    AnalysisResponse, BlobListing, BlobUrlResponse, ChatRequest, ChatResponse,
    GenerationResponse, ImageUpload, TextGenerationRequest,
};
use crate::Result;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

const LISTING_SUGGESTION: &str =
    "Keep the blob ids returned by the generation endpoints to retrieve artifacts later";

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
    }))
}

/// POST /generate/text
pub async fn generate_text(
    State(app): State<Arc<App>>,
    payload: std::result::Result<Json<TextGenerationRequest>, JsonRejection>,
) -> Result<Json<GenerationResponse>> {
    let Json(request) = payload?;
    let artifact = app.generate_from_text(request.prompt.as_deref()).await?;
    let persisted = app.persist(artifact).await?;
    Ok(Json(persisted.into()))
}

/// POST /generate/image (multipart: `image` file, optional `prompt`)
pub async fn generate_image(
    State(app): State<Arc<App>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerationResponse>> {
    let form = read_image_form(multipart?).await?;
    let artifact = app
        .generate_from_image(form.image, form.prompt.as_deref())
        .await?;
    let persisted = app.persist(artifact).await?;
    Ok(Json(persisted.into()))
}

/// POST /analyze/image (multipart: `image` file)
pub async fn analyze_image(
    State(app): State<Arc<App>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>> {
    let form = read_image_form(multipart?).await?;
    let analyzed = app.analyze_image(form.image).await?;
    Ok(Json(analyzed.into()))
}

/// GET /download/svg/:id
pub async fn download_svg(
    State(app): State<Arc<App>>,
    Path(blob_id): Path<String>,
) -> Result<Response> {
    download(&app, &blob_id, DownloadKind::Svg).await
}

/// GET /download/metadata/:id
pub async fn download_metadata(
    State(app): State<Arc<App>>,
    Path(blob_id): Path<String>,
) -> Result<Response> {
    download(&app, &blob_id, DownloadKind::Metadata).await
}

/// GET /download/image/:id
pub async fn download_image(
    State(app): State<Arc<App>>,
    Path(blob_id): Path<String>,
) -> Result<Response> {
    download(&app, &blob_id, DownloadKind::Image).await
}

async fn download(app: &App, blob_id: &str, kind: DownloadKind) -> Result<Response> {
    let response = match app.resolve_download(blob_id, kind).await? {
        Download::Svg(markup) => {
            ([(header::CONTENT_TYPE, "image/svg+xml")], markup).into_response()
        }
        Download::Metadata(metadata) => Json(metadata).into_response(),
        Download::Image {
            bytes,
            content_type,
        } => ([(header::CONTENT_TYPE, content_type)], bytes).into_response(),
    };
    Ok(response)
}

/// GET /svg/:id
pub async fn svg_url(
    State(app): State<Arc<App>>,
    Path(blob_id): Path<String>,
) -> Result<Json<BlobUrlResponse>> {
    Ok(Json(app.blob_url(&blob_id).await?))
}

/// GET /blobs and GET /files
pub async fn list_blobs(State(app): State<Arc<App>>) -> Result<Json<Value>> {
    let body = match app.list_generated_artifacts().await? {
        BlobListing::Supported(files) => json!({
            "supported": true,
            "count": files.len(),
            "files": files,
        }),
        BlobListing::Unsupported { reason } => json!({
            "supported": false,
            "message": reason,
            "suggestion": LISTING_SUGGESTION,
        }),
    };
    Ok(Json(body))
}

/// POST /chat
pub async fn chat(
    State(app): State<Arc<App>>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let Json(request) = payload?;
    let completion = app
        .chat(request.message.as_deref(), request.image_context.as_ref())
        .await?;

    Ok(Json(ChatResponse {
        success: true,
        response: completion.reply,
        message_id: completion.turn_count,
    }))
}

/// GET /chat/history
pub async fn chat_history(State(app): State<Arc<App>>) -> Json<Value> {
    Json(json!({ "history": app.chat_history().await }))
}

/// POST /chat/reset
pub async fn reset_chat(State(app): State<Arc<App>>) -> Json<Value> {
    app.reset_chat().await;
    Json(json!({
        "success": true,
        "message": "Conversation reset",
    }))
}

#[derive(Default)]
struct ImageForm {
    image: Option<ImageUpload>,
    prompt: Option<String>,
}

/// Pull the `image` file and optional `prompt` out of a multipart body.
/// Unknown fields are skipped.
async fn read_image_form(mut multipart: Multipart) -> Result<ImageForm> {
    let mut form = ImageForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                form.image = Some(ImageUpload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            Some("prompt") => form.prompt = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(form)
}
