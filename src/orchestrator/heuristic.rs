//! Local diary analysis used when the generative path is unavailable.
//!
//! Matching is plain substring counting over the lower-cased transcript, so
//! "unhappy" still counts as "happy". Callers rely on that behaviour.

use crate::models::internal::Mood;

pub const POSITIVE_TERMS: &[&str] = &[
    "happy",
    "glad",
    "great",
    "good",
    "amazing",
    "awesome",
    "excited",
    "fun",
    "love",
    "wonderful",
    "enjoy",
    "relaxed",
    "proud",
    "grateful",
    "fantastic",
];

pub const NEGATIVE_TERMS: &[&str] = &[
    "sad",
    "tired",
    "stressed",
    "upset",
    "angry",
    "bad",
    "anxious",
    "worried",
    "lonely",
    "awful",
    "terrible",
    "exhausted",
    "frustrated",
    "depressed",
    "annoyed",
];

pub const EXAM_TITLE: &str = "Exam Day Reflections";
pub const TRAVEL_TITLE: &str = "Notes From My Trip";
pub const POSITIVE_TITLE: &str = "A Bright and Happy Day";
pub const NEGATIVE_TITLE: &str = "A Tough Day";
/// Shared with the synthesizer's fallback title.
pub const NEUTRAL_TITLE: &str = "Today's Diary";

pub const EMPTY_SUMMARY: &str = "A quiet day without much to report.";

const SUMMARY_MAX_CHARS: usize = 220;
const SUMMARY_KEEP_CHARS: usize = 217;
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeuristicAnalysis {
    pub title: String,
    pub summary: String,
    pub mood: Mood,
    /// Raw lexicon balance, not clamped.
    pub mood_score: i64,
}

pub fn analyze<S: AsRef<str>>(user_texts: &[S]) -> HeuristicAnalysis {
    let buffer = user_texts
        .iter()
        .map(|t| t.as_ref().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let score = count_terms(&buffer, POSITIVE_TERMS) - count_terms(&buffer, NEGATIVE_TERMS);
    let mood = Mood::from_score(score);

    let summary = user_texts
        .first()
        .map(|first| summarize(first.as_ref()))
        .unwrap_or_else(|| EMPTY_SUMMARY.to_string());

    HeuristicAnalysis {
        title: pick_title(&buffer, mood).to_string(),
        summary,
        mood,
        mood_score: score,
    }
}

fn count_terms(buffer: &str, terms: &[&str]) -> i64 {
    terms
        .iter()
        .map(|term| buffer.matches(term).count() as i64)
        .sum()
}

fn pick_title(buffer: &str, mood: Mood) -> &'static str {
    if buffer.contains("exam") || buffer.contains("test") {
        EXAM_TITLE
    } else if buffer.contains("travel") || buffer.contains("trip") {
        TRAVEL_TITLE
    } else {
        match mood {
            Mood::Positive => POSITIVE_TITLE,
            Mood::Negative => NEGATIVE_TITLE,
            Mood::Neutral => NEUTRAL_TITLE,
        }
    }
}

fn summarize(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > SUMMARY_MAX_CHARS {
        let mut cut: String = trimmed.chars().take(SUMMARY_KEEP_CHARS).collect();
        cut.push_str(ELLIPSIS);
        cut
    } else {
        trimmed.to_string()
    }
}
