use serde_json::{Map, Value};
use std::sync::Arc;

use crate::models::internal::{clamp_mood_score, DiaryDraft, Message, Mood, Preferences};
use crate::orchestrator::heuristic::NEUTRAL_TITLE;
use crate::services::generator::{GenerationError, TextGenerator};

pub const FALLBACK_TITLE: &str = NEUTRAL_TITLE;
pub const FALLBACK_CONTENT: &str = "I talked with my diary today, but the words did not come together.";
pub const FALLBACK_SUMMARY: &str = "A day worth remembering.";

const DEFAULT_INSTRUCTION: &str = "Write in a warm, personal, reflective style.";
const DIARY_KEYS: [&str; 5] = ["title", "content", "summary", "mood", "mood_score"];

pub struct DiarySynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl DiarySynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn synthesize(
        &self,
        messages: &[Message],
        preferences: Option<&Preferences>,
    ) -> Result<DiaryDraft, GenerationError> {
        let prompt = build_diary_prompt(messages, preferences);
        let raw = self.generator.generate(&prompt).await?;
        let payload = parse_payload(&raw)?;
        Ok(normalize_draft(&payload))
    }
}

pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = if m.role.is_user() { "Me" } else { "AI Assistant" };
            format!("{}: {}", speaker, m.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_preferences(preferences: Option<&Preferences>) -> String {
    let present = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut lines = Vec::new();
    if let Some(prefs) = preferences {
        if let Some(theme) = present(&prefs.theme) {
            lines.push(format!("- Theme: {}", theme));
        }
        if let Some(style) = present(&prefs.style) {
            lines.push(format!("- Writing style: {}", style));
        }
        if let Some(extra) = present(&prefs.custom_instructions) {
            lines.push(format!("- Additional instructions: {}", extra));
        }
    }

    if lines.is_empty() {
        lines.push(format!("- {}", DEFAULT_INSTRUCTION));
    }

    lines.join("\n")
}

pub fn build_diary_prompt(messages: &[Message], preferences: Option<&Preferences>) -> String {
    format!(
        "You are a thoughtful diary writer. Turn the conversation below between me \
        and my AI assistant into my personal diary entry for today.\n\n\
        Preferences:\n{}\n\n\
        Requirements:\n\
        - Write in the first person, as me.\n\
        - The content must be 150-300 words.\n\
        - Do not restate the conversation verbatim; reflect on what happened and how I felt.\n\
        - Provide a short title and a one-sentence summary.\n\
        - mood must be one of \"positive\", \"negative\" or \"neutral\".\n\
        - mood_score must be an integer from -5 (very negative) to 5 (very positive).\n\n\
        Conversation:\n{}\n\n\
        Respond with ONLY a JSON object with exactly these keys and nothing else:\n\
        {{\"title\": string, \"content\": string, \"summary\": string, \"mood\": string, \"mood_score\": integer}}",
        render_preferences(preferences),
        render_transcript(messages)
    )
}

/// Trim the reply and drop a surrounding ``` fence if the model added one.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let body = match trimmed.split_once('\n') {
        Some((_, rest)) => rest,
        None => return "",
    };

    match body.trim_end().rsplit_once('\n') {
        Some((inner, last)) if last.trim_start().starts_with("```") => inner.trim(),
        None if body.trim().starts_with("```") => "",
        _ => body.trim(),
    }
}

pub fn parse_payload(raw: &str) -> Result<Map<String, Value>, GenerationError> {
    let cleaned = strip_code_fence(raw);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| GenerationError::MalformedResponse(format!("not JSON: {}", e)))?;

    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(GenerationError::MalformedResponse(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    if !DIARY_KEYS.iter().any(|key| object.contains_key(*key)) {
        return Err(GenerationError::MalformedResponse(
            "none of the diary fields are present".to_string(),
        ));
    }

    Ok(object)
}

/// Turn an untrusted model payload into a draft that satisfies the diary schema.
pub fn normalize_draft(payload: &Map<String, Value>) -> DiaryDraft {
    let mood = payload
        .get("mood")
        .and_then(Value::as_str)
        .map(Mood::parse_lenient)
        .unwrap_or_default();

    let mood_score = payload
        .get("mood_score")
        .map(coerce_mood_score)
        .unwrap_or(0);

    DiaryDraft {
        title: text_field(payload, "title", FALLBACK_TITLE),
        content: text_field(payload, "content", FALLBACK_CONTENT),
        summary: text_field(payload, "summary", FALLBACK_SUMMARY),
        mood,
        mood_score,
    }
}

/// Integer-like values are truncated toward zero and clamped; anything else is 0.
pub fn coerce_mood_score(value: &Value) -> i32 {
    let raw = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };

    raw.map(clamp_mood_score).unwrap_or(0)
}

fn text_field(payload: &Map<String, Value>, key: &str, fallback: &str) -> String {
    match payload.get(key).and_then(Value::as_str).map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => fallback.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
