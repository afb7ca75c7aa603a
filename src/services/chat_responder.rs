use std::sync::Arc;

use crate::services::generator::{GenerationError, TextGenerator};

/// Short, friendly replies to a single user message.
pub struct ChatResponder {
    generator: Arc<dyn TextGenerator>,
}

impl ChatResponder {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn reply(&self, user_text: &str) -> Result<String, GenerationError> {
        let prompt = build_reply_prompt(user_text);
        let reply = self.generator.generate(&prompt).await?;
        let reply = reply.trim();

        if reply.is_empty() {
            return Err(GenerationError::InvalidResponse("empty chat reply".to_string()));
        }

        Ok(reply.to_string())
    }
}

pub fn build_reply_prompt(user_text: &str) -> String {
    format!(
        "You are a cheerful, warm, slightly humorous diary assistant.\n\
         Respond casually and kindly, as if comforting a friend.\n\
         The user said: \"{}\"\n\n\
         Reply in a friendly and supportive tone, 1-3 sentences, no emojis.",
        user_text
    )
}
