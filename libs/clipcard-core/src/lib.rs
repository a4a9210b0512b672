//! Core clipboard-to-flashcard pipeline shared by the importer.
//!
//! Provides:
//! - Keyword classifier selecting a content kind for a clip
//! - Line-oriented parsers for the MCQ and note layouts
//! - HTML formatter for field values
//! - Bounded dedup cache keyed by normalized-content fingerprints
//! - Card templates and the card builder

pub mod classifier;
pub mod dedup;
pub mod error;
pub mod formatter;
pub mod parser;
pub mod template;
pub mod types;

pub use classifier::{Classifier, Keyword};
pub use dedup::{fingerprint, normalize, DedupCache, DedupEntry};
pub use error::{BuildError, ParseError, Result};
pub use formatter::{format, FormatOptions};
pub use parser::parse;
pub use template::{CardTemplate, FieldMapping, TemplateSet};
pub use types::{Card, ContentKind, ParsedContent, RawClip};
