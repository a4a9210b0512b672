//! Core types for the clipboard import pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Layout families recognized by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// `question:` / `optionA:` / `answer:` / `note:` lines.
    Mcq,
    /// `• question:` / `• options:` with lettered lines.
    BulletMcq,
    /// `Q:` / `A:` note.
    QuestionAnswer,
    /// `Term:` / `Definition:` note.
    Definition,
    /// Titled bulleted list.
    List,
}

impl ContentKind {
    pub const ALL: [ContentKind; 5] = [
        Self::Mcq,
        Self::BulletMcq,
        Self::QuestionAnswer,
        Self::Definition,
        Self::List,
    ];

    /// Get the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mcq => "mcq",
            Self::BulletMcq => "bullet_mcq",
            Self::QuestionAnswer => "question_answer",
            Self::Definition => "definition",
            Self::List => "list",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "mcq" => Some(Self::Mcq),
            "bullet_mcq" => Some(Self::BulletMcq),
            "question_answer" | "qa" => Some(Self::QuestionAnswer),
            "definition" => Some(Self::Definition),
            "list" => Some(Self::List),
            _ => None,
        }
    }

    /// Whether this kind is one of the multiple-choice layouts.
    pub fn is_mcq(&self) -> bool {
        matches!(self, Self::Mcq | Self::BulletMcq)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clipboard text captured at one poll tick.
#[derive(Debug, Clone)]
pub struct RawClip {
    pub text: String,
    pub observed_at: DateTime<Utc>,
}

impl RawClip {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            observed_at: Utc::now(),
        }
    }
}

/// Fields extracted from a clip, in source order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedContent {
    pub kind: ContentKind,
    pub fields: Vec<(String, String)>,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl ParsedContent {
    /// Look up a field value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Field names in source order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }
}

/// Note ready for submission to the flashcard application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub deck: String,
    pub model: String,
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

impl Card {
    /// Look up a target field value.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}
