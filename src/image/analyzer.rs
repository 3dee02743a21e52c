use crate::models::{ImageMetadata, Metadata};
use crate::{Error, Result};
use chrono::Utc;
use image::ColorType;
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct ImageAnalyzer;

impl ImageAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn analyze_sync(bytes: Vec<u8>, filename: String) -> Result<ImageMetadata> {
        let format = image::guess_format(&bytes)
            .map_err(|_| Error::Validation("Unrecognized image format".to_string()))?;
        let decoded = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| Error::Validation(format!("Failed to decode image: {}", e)))?;

        Ok(ImageMetadata {
            filename,
            format: format!("{:?}", format).to_uppercase(),
            width: decoded.width(),
            height: decoded.height(),
            mode: color_mode(decoded.color()).to_string(),
            file_size: bytes.len(),
            analyzed_at: Utc::now().to_rfc3339(),
        })
    }

    /// Decode `bytes` and describe the image. Undecodable input is a validation error.
    pub async fn analyze(&self, bytes: &[u8], filename: &str) -> Result<ImageMetadata> {
        tokio::task::spawn_blocking({
            let bytes = bytes.to_vec();
            let filename = filename.to_string();
            move || Self::analyze_sync(bytes, filename)
        })
        .await
        .map_err(|e| Error::Internal(format!("Image analysis task join error: {}", e)))?
    }
}

fn color_mode(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::L16 => "I;16",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        _ => "UNKNOWN",
    }
}

impl ImageMetadata {
    pub fn into_metadata(self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("filename".into(), Value::from(self.filename));
        metadata.insert("format".into(), Value::from(self.format));
        metadata.insert("width".into(), Value::from(self.width));
        metadata.insert("height".into(), Value::from(self.height));
        metadata.insert("mode".into(), Value::from(self.mode));
        metadata.insert("file_size".into(), Value::from(self.file_size));
        metadata.insert("analyzed_at".into(), Value::from(self.analyzed_at));
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use std::io::Cursor;

    fn encode(image: image::DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    fn create_test_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(10, 10, image::Rgba([255, 0, 0, 255]));
        encode(image::DynamicImage::ImageRgba8(img), ImageFormat::Png)
    }

    #[tokio::test]
    async fn test_analyze_png() {
        let bytes = create_test_png();
        let metadata = ImageAnalyzer::new()
            .analyze(&bytes, "red.png")
            .await
            .unwrap();

        assert_eq!(metadata.filename, "red.png");
        assert_eq!(metadata.format, "PNG");
        assert_eq!(metadata.width, 10);
        assert_eq!(metadata.height, 10);
        assert_eq!(metadata.mode, "RGBA");
        assert_eq!(metadata.file_size, bytes.len());
        assert!(chrono::DateTime::parse_from_rfc3339(&metadata.analyzed_at).is_ok());
    }

    #[tokio::test]
    async fn test_format_follows_content_not_filename() {
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([0, 128, 255]));
        let bytes = encode(image::DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        let metadata = ImageAnalyzer::new()
            .analyze(&bytes, "mislabelled.png")
            .await
            .unwrap();

        assert_eq!(metadata.format, "JPEG");
        assert_eq!(metadata.mode, "RGB");
        assert_eq!((metadata.width, metadata.height), (4, 3));
    }

    #[tokio::test]
    async fn test_garbage_is_validation_error() {
        let result = ImageAnalyzer::new()
            .analyze(b"definitely not an image", "fake.png")
            .await;

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_into_metadata_is_flat() {
        let metadata = ImageMetadata {
            filename: "a.png".to_string(),
            format: "PNG".to_string(),
            width: 2,
            height: 3,
            mode: "L".to_string(),
            file_size: 42,
            analyzed_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
        .into_metadata();

        assert_eq!(metadata["width"], 2);
        assert_eq!(metadata["height"], 3);
        assert_eq!(metadata["format"], "PNG");
        assert_eq!(metadata["file_size"], 42);
    }
}
