use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lowest mood score a diary draft may carry.
pub const MOOD_SCORE_MIN: i32 = -5;
/// Highest mood score a diary draft may carry.
pub const MOOD_SCORE_MAX: i32 = 5;

/// Who authored a message. Raw role strings other than `"user"` map to the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Role::User)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from(value.as_str())
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        if value == "user" {
            Role::User
        } else {
            Role::Assistant
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub role: Role,
    pub text: String,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// User-authored texts of a transcript, in order.
pub fn user_texts(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.role.is_user())
        .map(|m| m.text.clone())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Completed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(ConversationStatus::Active),
            "completed" => Some(ConversationStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: Uuid,
    pub owner_id: String,
    /// UTC day bucket the conversation belongs to.
    pub day: NaiveDate,
    pub status: ConversationStatus,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role.is_user())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Mood {
    /// Case-insensitive parse; anything unrecognised is neutral.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "positive" => Mood::Positive,
            "negative" => Mood::Negative,
            _ => Mood::Neutral,
        }
    }

    /// Mood bucket for a lexicon score. Scores in [-1, 1] are neutral.
    pub fn from_score(score: i64) -> Self {
        if score > 1 {
            Mood::Positive
        } else if score < -1 {
            Mood::Negative
        } else {
            Mood::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Positive => "positive",
            Mood::Negative => "negative",
            Mood::Neutral => "neutral",
        }
    }
}

/// Clamp any score into the diary mood-score domain.
pub fn clamp_mood_score(score: i64) -> i32 {
    score.clamp(MOOD_SCORE_MIN as i64, MOOD_SCORE_MAX as i64) as i32
}

/// The five-field diary shape handed to callers. Never persisted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiaryDraft {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub mood: Mood,
    pub mood_score: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

/// A saved diary entry. Drafts become diaries only through an explicit save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Diary {
    pub id: Uuid,
    pub owner_id: String,
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

impl Diary {
    /// First `max_chars` characters of the content.
    pub fn preview(&self, max_chars: usize) -> String {
        self.content.chars().take(max_chars).collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewDiary {
    pub owner_id: String,
    pub conversation_id: Option<Uuid>,
    pub entry_date: NaiveDate,
    pub draft: DiaryDraft,
}

/// Partial edit; `None` leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct DiaryUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub mood: Option<Mood>,
    pub mood_score: Option<i32>,
    pub entry_date: Option<NaiveDate>,
}
