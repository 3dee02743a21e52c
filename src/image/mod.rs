//! Image analysis for uploaded pictures
//!
//! Decodes uploads locally to report their format, dimensions and colour
//! mode before they are handed to storage.

pub mod analyzer;

pub use analyzer::ImageAnalyzer;
