use super::{ArtifactGenerator, ConversationSession, Transcript};
use crate::models::{ChatCompletion, ConversationTurn, GeneratedArtifact, Metadata};
use crate::{prompts, Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const DEFAULT_SVG: &str =
    r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><circle cx="5" cy="5" r="4" fill="red"/></svg>"#;

/// In-memory generator that records how it was called.
#[derive(Clone)]
pub struct MockGenerator {
    responses: Arc<Mutex<Vec<String>>>,
    call_count: Arc<Mutex<usize>>,
    image_paths: Arc<Mutex<Vec<PathBuf>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
            image_paths: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_svg_response(self, svg: String) -> Self {
        self.responses.lock().unwrap().push(svg);
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Paths handed to `generate_from_image`, in call order.
    pub fn get_image_paths(&self) -> Vec<PathBuf> {
        self.image_paths.lock().unwrap().clone()
    }

    fn next_artifact(
        &self,
        artifact_type: &str,
        method: &str,
        prompt: &str,
    ) -> Result<GeneratedArtifact> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;

        if *self.should_fail.lock().unwrap() {
            return Err(Error::Generation("Mock generation failure".to_string()));
        }

        let responses = self.responses.lock().unwrap();
        let content = if responses.is_empty() {
            DEFAULT_SVG.to_string()
        } else {
            responses[(*count - 1) % responses.len()].clone()
        };

        let mut metadata = Metadata::new();
        metadata.insert("prompt".into(), Value::from(prompt));
        metadata.insert("type".into(), Value::from(artifact_type));
        metadata.insert("model".into(), Value::from("mock"));
        metadata.insert("generation_method".into(), Value::from(method));

        Ok(GeneratedArtifact { content, metadata })
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactGenerator for MockGenerator {
    async fn generate_from_prompt(&self, prompt: &str) -> Result<GeneratedArtifact> {
        self.next_artifact("text_to_artifact", "prompt", prompt)
    }

    async fn generate_from_image(
        &self,
        image_path: &Path,
        prompt: Option<&str>,
    ) -> Result<GeneratedArtifact> {
        self.image_paths
            .lock()
            .unwrap()
            .push(image_path.to_path_buf());
        if !image_path.exists() {
            return Err(Error::Internal(format!(
                "Image path {} does not exist",
                image_path.display()
            )));
        }
        self.next_artifact("image_to_artifact", "image_analysis", prompt.unwrap_or_default())
    }
}

/// In-memory chat session with the same transcript rules as the real one.
#[derive(Clone)]
pub struct MockChatSession {
    transcript: Arc<Mutex<Transcript>>,
    sent: Arc<Mutex<Vec<String>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockChatSession {
    pub fn new() -> Self {
        Self {
            transcript: Arc::new(Mutex::new(Transcript::seeded(
                prompts::CHAT_PERSONA,
                prompts::CHAT_GREETING,
            ))),
            sent: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Every text forwarded to the session, in order.
    pub fn get_sent_messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Transcript length including the two seed turns.
    pub fn get_turn_count(&self) -> usize {
        self.transcript.lock().unwrap().len()
    }
}

impl Default for MockChatSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationSession for MockChatSession {
    async fn append_and_complete(&self, text: &str) -> Result<ChatCompletion> {
        self.sent.lock().unwrap().push(text.to_string());

        if *self.should_fail.lock().unwrap() {
            return Err(Error::Generation("Mock chat failure".to_string()));
        }

        let reply = format!("Echo: {}", text);
        let mut transcript = self.transcript.lock().unwrap();
        transcript.record(text, &reply);

        Ok(ChatCompletion {
            reply,
            turn_count: transcript.len(),
        })
    }

    async fn history(&self) -> Vec<ConversationTurn> {
        self.transcript.lock().unwrap().visible().to_vec()
    }

    async fn reset(&self) {
        *self.transcript.lock().unwrap() =
            Transcript::seeded(prompts::CHAT_PERSONA, prompts::CHAT_RESET_GREETING);
    }
}
