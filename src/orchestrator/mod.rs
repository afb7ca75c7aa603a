pub mod heuristic;
pub mod synthesizer;

use std::sync::Arc;
use std::time::Duration;

use crate::models::internal::{clamp_mood_score, user_texts, DiaryDraft, Message, Preferences};
use crate::services::generator::{GenerationError, TextGenerator};
use synthesizer::DiarySynthesizer;

pub const EMPTY_CONTENT: &str = "Today you had a short chat with your AI diary.";

/// Turns a transcript snapshot into a diary draft. One generative attempt,
/// heuristic fallback on any failure, no persistence.
pub struct DiaryPipeline {
    synthesizer: DiarySynthesizer,
    timeout: Option<Duration>,
}

impl DiaryPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            synthesizer: DiarySynthesizer::new(generator),
            timeout: None,
        }
    }

    /// Bound the generative attempt; expiry takes the fallback path.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn generate_draft(
        &self,
        messages: &[Message],
        preferences: Option<&Preferences>,
    ) -> DiaryDraft {
        match self.attempt_synthesis(messages, preferences).await {
            Ok(draft) => {
                tracing::info!(
                    "Generated diary draft from {} messages (mood {})",
                    messages.len(),
                    draft.mood.as_str()
                );
                draft
            }
            Err(e) => {
                if e.is_transport() {
                    tracing::warn!("Diary generation unavailable, using heuristic draft: {}", e);
                } else {
                    tracing::warn!("Diary generation returned unusable output, using heuristic draft: {}", e);
                }
                heuristic_draft(messages)
            }
        }
    }

    async fn attempt_synthesis(
        &self,
        messages: &[Message],
        preferences: Option<&Preferences>,
    ) -> Result<DiaryDraft, GenerationError> {
        let attempt = self.synthesizer.synthesize(messages, preferences);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .map_err(|_| GenerationError::Timeout(limit))?,
            None => attempt.await,
        }
    }
}

/// Draft built only from the user's own words.
pub fn heuristic_draft(messages: &[Message]) -> DiaryDraft {
    let texts = user_texts(messages);
    let analysis = heuristic::analyze(&texts);

    let content = if texts.is_empty() {
        EMPTY_CONTENT.to_string()
    } else {
        texts.join("\n")
    };

    DiaryDraft {
        title: analysis.title,
        content,
        summary: analysis.summary,
        mood: analysis.mood,
        mood_score: clamp_mood_score(analysis.mood_score),
    }
}
