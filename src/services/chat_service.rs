use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::internal::{Message, Role};
use crate::services::chat_responder::ChatResponder;
use crate::services::generator::GenerationError;
use crate::services::transcription::{AudioInput, Transcriber, TranscriptionError};
use crate::storage::repository::{StoreError, TranscriptStore};

/// Stored text for a recording that transcribed to nothing.
pub const EMPTY_TRANSCRIPTION: &str = "(empty transcription)";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Reply generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("Transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatTurn {
    pub conversation_id: Uuid,
    pub reply: String,
    pub history: Vec<Message>,
}

/// One chat turn: today's conversation, user message, assistant reply, full history.
pub struct ChatService {
    store: Arc<dyn TranscriptStore>,
    responder: ChatResponder,
}

impl ChatService {
    pub fn new(store: Arc<dyn TranscriptStore>, responder: ChatResponder) -> Self {
        Self { store, responder }
    }

    pub async fn chat_turn(&self, owner_id: &str, text: &str) -> Result<ChatTurn, ChatError> {
        self.chat_turn_on(owner_id, text, Utc::now().date_naive()).await
    }

    /// Same as [`chat_turn`](Self::chat_turn) with an explicit UTC day bucket.
    pub async fn chat_turn_on(
        &self,
        owner_id: &str,
        text: &str,
        day: NaiveDate,
    ) -> Result<ChatTurn, ChatError> {
        let conversation = self.store.get_or_create_active(owner_id, day).await?;

        // The user's words are kept even if the reply fails
        self.store
            .append_message(conversation.id, Role::User, text)
            .await?;

        let reply = self.responder.reply(text).await?;
        self.store
            .append_message(conversation.id, Role::Assistant, &reply)
            .await?;

        let history = self.store.get_messages(conversation.id).await?;
        tracing::debug!(
            "Chat turn for {} on conversation {} ({} messages)",
            owner_id,
            conversation.id,
            history.len()
        );

        Ok(ChatTurn {
            conversation_id: conversation.id,
            reply,
            history,
        })
    }

    pub async fn audio_turn(
        &self,
        owner_id: &str,
        audio: AudioInput,
        transcriber: &dyn Transcriber,
    ) -> Result<ChatTurn, ChatError> {
        let text = transcriber.transcribe(audio).await?;
        let text = if text.trim().is_empty() {
            EMPTY_TRANSCRIPTION.to_string()
        } else {
            text
        };

        self.chat_turn(owner_id, &text).await
    }
}
