//! AI service integration for SVG generation and chat
//!
//! Provides the generator and conversation seams the request mediator talks
//! to, plus Gemini-backed implementations and in-memory mocks.

pub mod fence;
pub mod gemini;
pub mod mime;
pub mod mock;
pub mod transcript;

pub use fence::strip_code_fence;
pub use gemini::{GeminiChatSession, GeminiSvgGenerator};
pub use mock::{MockChatSession, MockGenerator};
pub use transcript::Transcript;

use crate::models::{ChatCompletion, ConversationTurn, GeneratedArtifact};
use crate::Result;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate_from_prompt(&self, prompt: &str) -> Result<GeneratedArtifact>;

    /// Generate from an image already written to `image_path`.
    async fn generate_from_image(
        &self,
        image_path: &Path,
        prompt: Option<&str>,
    ) -> Result<GeneratedArtifact>;
}

/// A single multi-turn exchange with a completion service.
///
/// Implementations serialize appends so one session can be shared by
/// concurrent requests.
#[async_trait]
pub trait ConversationSession: Send + Sync {
    async fn append_and_complete(&self, text: &str) -> Result<ChatCompletion>;

    /// Visible turns, oldest first. Seed turns are not included.
    async fn history(&self) -> Vec<ConversationTurn>;

    /// Drop every turn and start over from a freshly seeded transcript.
    async fn reset(&self);
}
