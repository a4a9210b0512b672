//! Marker-based content classification.
//!
//! Every line of a clip is trimmed and lowercased, then checked for a marker
//! prefix. The highest-priority marker found anywhere in the clip decides the
//! kind; on equal priority the earlier table entry wins.

use crate::types::ContentKind;
use std::borrow::Cow;

/// Marker token mapped to a content kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub marker: Cow<'static, str>,
    pub kind: ContentKind,
    pub priority: u8,
}

impl Keyword {
    pub const fn new(marker: &'static str, kind: ContentKind, priority: u8) -> Self {
        Self {
            marker: Cow::Borrowed(marker),
            kind,
            priority,
        }
    }
}

const DEFAULT_KEYWORDS: &[Keyword] = &[
    Keyword::new("• question:", ContentKind::BulletMcq, 40),
    Keyword::new("• options:", ContentKind::BulletMcq, 40),
    Keyword::new("• answer:", ContentKind::BulletMcq, 40),
    Keyword::new("question:", ContentKind::Mcq, 30),
    Keyword::new("optiona:", ContentKind::Mcq, 30),
    Keyword::new("optionb:", ContentKind::Mcq, 30),
    Keyword::new("optionc:", ContentKind::Mcq, 30),
    Keyword::new("optiond:", ContentKind::Mcq, 30),
    Keyword::new("optione:", ContentKind::Mcq, 30),
    Keyword::new("optionf:", ContentKind::Mcq, 30),
    Keyword::new("answer:", ContentKind::Mcq, 30),
    Keyword::new("q:", ContentKind::QuestionAnswer, 20),
    Keyword::new("a:", ContentKind::QuestionAnswer, 20),
    Keyword::new("term:", ContentKind::Definition, 15),
    Keyword::new("definition:", ContentKind::Definition, 15),
    Keyword::new("list:", ContentKind::List, 10),
    Keyword::new("•", ContentKind::List, 5),
];

/// Selects a content kind from marker tokens.
#[derive(Debug, Clone)]
pub struct Classifier {
    keywords: Vec<Keyword>,
}

impl Classifier {
    /// Build a classifier from a keyword table. Markers are matched
    /// case-insensitively, so they are stored lowercased.
    pub fn new(keywords: Vec<Keyword>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| Keyword {
                marker: Cow::Owned(k.marker.trim().to_lowercase()),
                ..k
            })
            .filter(|k| !k.marker.is_empty())
            .collect();
        Self { keywords }
    }

    /// Default table restricted to the given kinds.
    pub fn for_kinds(kinds: &[ContentKind]) -> Self {
        Self::new(
            DEFAULT_KEYWORDS
                .iter()
                .filter(|k| kinds.contains(&k.kind))
                .cloned()
                .collect(),
        )
    }

    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    /// Classify a clip. `None` means no marker matched and the clip should
    /// be skipped.
    pub fn classify(&self, text: &str) -> Option<ContentKind> {
        let lines: Vec<String> = text
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty())
            .collect();

        let mut best: Option<&Keyword> = None;
        for keyword in &self.keywords {
            if best.is_some_and(|b| b.priority >= keyword.priority) {
                continue;
            }
            if lines.iter().any(|line| line.starts_with(keyword.marker.as_ref())) {
                best = Some(keyword);
            }
        }
        best.map(|k| k.kind)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.to_vec())
    }
}
