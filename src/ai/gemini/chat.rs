use super::client::GeminiHttpClient;
use super::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig};
use crate::ai::{ConversationSession, Transcript};
use crate::models::{ChatCompletion, ConversationTurn};
use crate::{prompts, Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;

/// Gemini-backed chat session with a persona-seeded transcript.
pub struct GeminiChatSession {
    http: GeminiHttpClient,
    transcript: Mutex<Transcript>,
}

impl GeminiChatSession {
    pub fn new_with_client(
        api_key: String,
        model: String,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, model, timeout, client),
            transcript: Mutex::new(Transcript::seeded(
                prompts::CHAT_PERSONA,
                prompts::CHAT_GREETING,
            )),
        }
    }
}

#[cfg(test)]
super::impl_with_gemini_base_url!(GeminiChatSession);

#[async_trait]
impl ConversationSession for GeminiChatSession {
    async fn append_and_complete(&self, text: &str) -> Result<ChatCompletion> {
        // Held across the model call so concurrent exchanges cannot interleave.
        let mut transcript = self.transcript.lock().await;

        let mut contents: Vec<Content> = transcript.turns().iter().map(Content::from).collect();
        contents.push(Content::from(&ConversationTurn::user(text)));

        let request = GenerateContentRequest {
            system_instruction: None,
            contents,
            generation_config: Some(GenerationConfig {
                max_output_tokens: Some(2048),
                temperature: Some(0.8),
            }),
        };

        let response: GenerateContentResponse = self.http.generate_content(&request).await?;
        let reply = response
            .first_text()
            .ok_or_else(|| Error::Generation("No text in Gemini chat response".to_string()))?;

        transcript.record(text, &reply);
        tracing::debug!("Chat transcript now has {} turns", transcript.len());

        Ok(ChatCompletion {
            reply,
            turn_count: transcript.len(),
        })
    }

    async fn history(&self) -> Vec<ConversationTurn> {
        self.transcript.lock().await.visible().to_vec()
    }

    async fn reset(&self) {
        let mut transcript = self.transcript.lock().await;
        *transcript = Transcript::seeded(prompts::CHAT_PERSONA, prompts::CHAT_RESET_GREETING);
        tracing::info!("Chat session reset");
    }
}
