use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::internal::{Diary, DiaryDraft, Message, Mood, Preferences, Role};

/// Characters of content shown in list, search and calendar entries.
pub const PREVIEW_CHARS: usize = 80;

// ==================== REQUEST DTOs ====================

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ChatRequest {
    pub user_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TranscriptMessageDto {
    /// `"user"` or anything else for the assistant
    pub role: String,
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct GenerateDiaryRequest {
    #[serde(default)]
    pub messages: Vec<TranscriptMessageDto>,
    #[serde(default)]
    pub preferences: Option<Preferences>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct DraftRequest {
    #[serde(default)]
    pub preferences: Option<Preferences>,
}

#[derive(Debug, Deserialize)]
pub struct AudioChatParams {
    #[serde(default)]
    pub user_id: String,
}

/// The (possibly user-edited) draft to keep.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct SaveDiaryRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    /// Integer, numeric string or float; coerced like model output
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub mood_score: Option<Value>,
    /// `YYYY-MM-DD`; anything unparseable means today
    #[serde(default)]
    pub entry_date: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateDiaryRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub mood_score: Option<Value>,
    #[serde(default)]
    pub entry_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DiaryListParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DiarySearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct CalendarParams {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

// ==================== RESPONSE DTOs ====================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub reply: String,
    pub history: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TranscribeResponse {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationDraftResponse {
    pub conversation_id: Uuid,
    pub suggested_date: NaiveDate,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub mood: Mood,
    pub mood_score: i32,
}

impl ConversationDraftResponse {
    pub fn new(conversation_id: Uuid, suggested_date: NaiveDate, draft: DiaryDraft) -> Self {
        Self {
            conversation_id,
            suggested_date,
            title: draft.title,
            content: draft.content,
            summary: draft.summary,
            mood: draft.mood,
            mood_score: draft.mood_score,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompleteResponse {
    pub conversation_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DiaryResponse {
    pub diary_id: Uuid,
    pub conversation_id: Option<Uuid>,
    pub entry_date: NaiveDate,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub mood: Mood,
    pub mood_score: i32,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTime<Utc>,
}

impl From<Diary> for DiaryResponse {
    fn from(diary: Diary) -> Self {
        Self {
            diary_id: diary.id,
            conversation_id: diary.conversation_id,
            entry_date: diary.entry_date,
            title: diary.title,
            content: diary.content,
            summary: diary.summary,
            mood: diary.mood,
            mood_score: diary.mood_score,
            created_at: diary.created_at,
            updated_at: diary.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DiarySummary {
    pub diary_id: Uuid,
    pub entry_date: NaiveDate,
    pub title: String,
    pub mood: Mood,
    pub preview: String,
}

impl From<&Diary> for DiarySummary {
    fn from(diary: &Diary) -> Self {
        Self {
            diary_id: diary.id,
            entry_date: diary.entry_date,
            title: diary.title.clone(),
            mood: diary.mood,
            preview: diary.preview(PREVIEW_CHARS),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DiaryListResponse {
    pub diaries: Vec<DiarySummary>,
    pub total: u64,
    pub page: u64,
    pub pages: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DiarySearchResponse {
    pub diaries: Vec<DiarySummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CalendarResponse {
    pub year: i32,
    pub month: u32,
    /// Keyed by `YYYY-MM-DD`
    pub diaries_by_date: BTreeMap<String, Vec<DiarySummary>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u32,
}

impl From<TranscriptMessageDto> for Message {
    fn from(dto: TranscriptMessageDto) -> Self {
        Message::new(Role::from(dto.role), dto.text)
    }
}
