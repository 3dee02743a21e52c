use super::client::GeminiHttpClient;
use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, InlineData, Part,
};
use crate::ai::{strip_code_fence, ArtifactGenerator};
use crate::models::{GeneratedArtifact, Metadata};
use crate::{prompts, Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use image::ImageFormat;
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

pub const TEXT_ARTIFACT_TYPE: &str = "text_to_artifact";
pub const IMAGE_ARTIFACT_TYPE: &str = "image_to_artifact";

pub struct GeminiSvgGenerator {
    http: GeminiHttpClient,
}

impl GeminiSvgGenerator {
    pub fn new_with_client(
        api_key: String,
        model: String,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, model, timeout, client),
        }
    }

    async fn request_svg(&self, system: &str, parts: Vec<Part>) -> Result<String> {
        let request = GenerateContentRequest {
            system_instruction: Some(Content::system(system.trim())),
            contents: vec![Content::user(parts)],
            generation_config: Some(GenerationConfig {
                max_output_tokens: Some(8192),
                temperature: None,
            }),
        };

        let response: GenerateContentResponse = self.http.generate_content(&request).await?;

        let text = response
            .first_text()
            .ok_or_else(|| Error::Generation("No text in Gemini SVG response".to_string()))?;

        let svg = strip_code_fence(&text);
        if svg.is_empty() {
            return Err(Error::Generation(
                "Gemini returned an empty SVG payload".to_string(),
            ));
        }
        Ok(svg)
    }

    fn metadata(&self, artifact_type: &str, method: &str, prompt: &str) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("prompt".into(), Value::from(prompt));
        metadata.insert("type".into(), Value::from(artifact_type));
        metadata.insert("model".into(), Value::from(self.http.model()));
        metadata.insert("generation_method".into(), Value::from(method));
        metadata.insert(
            "created_at".into(),
            Value::from(chrono::Utc::now().to_rfc3339()),
        );
        metadata
    }

    /// Decode whatever format was uploaded and re-encode it as PNG.
    async fn png_from_file(image_path: &Path) -> Result<Vec<u8>> {
        let raw = tokio::fs::read(image_path).await?;

        tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let image = image::load_from_memory(&raw)
                .map_err(|e| Error::Validation(format!("Failed to process image: {}", e)))?;
            let mut png = Vec::new();
            image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
            Ok(png)
        })
        .await
        .map_err(|e| Error::Internal(format!("Image encoding task join error: {}", e)))?
    }
}

#[cfg(test)]
super::impl_with_gemini_base_url!(GeminiSvgGenerator);

#[async_trait]
impl ArtifactGenerator for GeminiSvgGenerator {
    async fn generate_from_prompt(&self, prompt: &str) -> Result<GeneratedArtifact> {
        tracing::debug!("Generating SVG from prompt via Gemini");

        let content = self
            .request_svg(prompts::SVG_TEXT_SYSTEM, vec![Part::text(prompt)])
            .await?;

        Ok(GeneratedArtifact {
            content,
            metadata: self.metadata(TEXT_ARTIFACT_TYPE, "prompt", prompt),
        })
    }

    async fn generate_from_image(
        &self,
        image_path: &Path,
        prompt: Option<&str>,
    ) -> Result<GeneratedArtifact> {
        let png = Self::png_from_file(image_path).await?;
        tracing::debug!("Generating SVG from image ({} bytes) via Gemini", png.len());

        let mut parts = vec![Part::InlineData {
            inline_data: InlineData {
                mime_type: "image/png".to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(&png),
            },
        }];
        let prompt = prompt.map(str::trim).unwrap_or_default();
        if !prompt.is_empty() {
            parts.push(Part::text(&format!("Prompt: {}", prompt)));
        }

        let content = self.request_svg(prompts::SVG_IMAGE_SYSTEM, parts).await?;

        Ok(GeneratedArtifact {
            content,
            metadata: self.metadata(IMAGE_ARTIFACT_TYPE, "image_analysis", prompt),
        })
    }
}
