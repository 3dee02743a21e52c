//! Append-only chat transcript shared by the session implementations.

use crate::models::ConversationTurn;

#[derive(Debug, Clone)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
    seed_len: usize,
}

impl Transcript {
    /// Start a transcript with the persona as a user turn and a greeting reply.
    pub fn seeded(persona: &str, greeting: &str) -> Self {
        let turns = vec![
            ConversationTurn::user(persona.trim()),
            ConversationTurn::assistant(greeting.trim()),
        ];
        Self {
            seed_len: turns.len(),
            turns,
        }
    }

    /// Append a completed exchange.
    pub fn record(&mut self, user: &str, reply: &str) {
        self.turns.push(ConversationTurn::user(user));
        self.turns.push(ConversationTurn::assistant(reply));
    }

    /// All turns including the seed, as sent to the model.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn visible(&self) -> &[ConversationTurn] {
        &self.turns[self.seed_len..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
