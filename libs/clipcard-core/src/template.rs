//! Card templates: map parsed fields onto note model fields.

use crate::error::BuildError;
use crate::formatter::{format, FormatOptions};
use crate::types::{Card, ContentKind, ParsedContent};
use std::collections::{BTreeMap, BTreeSet};

/// Maps one parsed field onto one target model field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: String,
    pub target: String,
    pub required: bool,
    pub default: Option<String>,
    /// Run the value through the HTML formatter.
    pub format: bool,
}

impl FieldMapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            required: false,
            default: None,
            format: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Copy the value verbatim instead of formatting it.
    pub fn raw(mut self) -> Self {
        self.format = false;
        self
    }
}

/// How one content kind becomes a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardTemplate {
    pub kind: ContentKind,
    pub deck: String,
    pub model: String,
    pub fields: Vec<FieldMapping>,
    pub tags: Vec<String>,
}

impl CardTemplate {
    /// Build a card from parsed content.
    ///
    /// Optional fields without a value are left out of the card; a required
    /// field without a value (or blank after formatting) is an error.
    pub fn build(
        &self,
        parsed: &ParsedContent,
        options: &FormatOptions,
    ) -> Result<Card, BuildError> {
        if parsed.kind != self.kind {
            return Err(BuildError::KindMismatch {
                expected: self.kind,
                actual: parsed.kind,
            });
        }

        let mut fields = BTreeMap::new();
        for mapping in &self.fields {
            let value = parsed
                .get(&mapping.source)
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
                .or_else(|| mapping.default.clone());

            let value = match value {
                Some(v) if mapping.format => format(&v, options),
                Some(v) => v.trim().to_string(),
                None => String::new(),
            };

            if value.trim().is_empty() {
                if mapping.required {
                    return Err(BuildError::MissingRequired {
                        target: mapping.target.clone(),
                        source_field: mapping.source.clone(),
                    });
                }
                continue;
            }
            fields.insert(mapping.target.clone(), value);
        }

        Ok(Card {
            deck: self.deck.clone(),
            model: self.model.clone(),
            fields,
            tags: self.tags.clone(),
        })
    }

    /// Target field names the model must provide.
    pub fn target_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|m| m.target.as_str())
    }
}

/// One template per content kind.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: BTreeMap<ContentKind, CardTemplate>,
}

impl TemplateSet {
    pub fn new(templates: impl IntoIterator<Item = CardTemplate>) -> Self {
        Self {
            templates: templates.into_iter().map(|t| (t.kind, t)).collect(),
        }
    }

    /// Built-in templates: both MCQ layouts use the multiple-choice model,
    /// the note layouts use a two-field Front/Back model.
    ///
    /// `tags` go on every card; multiple-choice cards also get `mcq`.
    pub fn defaults(deck: &str, mcq_model: &str, basic_model: &str, tags: &[String]) -> Self {
        let template = |kind: ContentKind, model: &str, fields| {
            let mut tags = tags.to_vec();
            if kind.is_mcq() && !tags.iter().any(|t| t == MCQ_TAG) {
                tags.push(MCQ_TAG.to_string());
            }
            CardTemplate {
                kind,
                deck: deck.to_string(),
                model: model.to_string(),
                fields,
                tags,
            }
        };
        let basic = |question: &str, answer: &str| {
            vec![
                FieldMapping::new(question, "Front").required(),
                FieldMapping::new(answer, "Back").required(),
            ]
        };

        Self::new([
            template(ContentKind::Mcq, mcq_model, mcq_fields()),
            template(ContentKind::BulletMcq, mcq_model, mcq_fields()),
            template(ContentKind::QuestionAnswer, basic_model, basic("question", "answer")),
            template(ContentKind::Definition, basic_model, basic("term", "definition")),
            template(ContentKind::List, basic_model, basic("title", "items")),
        ])
    }

    pub fn get(&self, kind: ContentKind) -> Result<&CardTemplate, BuildError> {
        self.templates.get(&kind).ok_or(BuildError::NoTemplate(kind))
    }

    pub fn build(&self, parsed: &ParsedContent, options: &FormatOptions) -> Result<Card, BuildError> {
        self.get(parsed.kind)?.build(parsed, options)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CardTemplate> {
        self.templates.values()
    }

    /// Distinct models with the union of the target fields they need.
    pub fn required_models(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut models: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for template in self.templates.values() {
            models
                .entry(template.model.as_str())
                .or_default()
                .extend(template.target_fields());
        }
        models
    }

    /// Distinct decks used by the templates.
    pub fn decks(&self) -> BTreeSet<&str> {
        self.templates.values().map(|t| t.deck.as_str()).collect()
    }
}

const MCQ_TAG: &str = "mcq";

fn mcq_fields() -> Vec<FieldMapping> {
    let mut fields = vec![FieldMapping::new("question", "Question").required()];
    fields.extend(
        ['A', 'B', 'C', 'D', 'E', 'F']
            .iter()
            .map(|letter| FieldMapping::new(format!("option{letter}"), format!("Option{letter}"))),
    );
    fields.push(FieldMapping::new("answer", "Answer").required().raw());
    fields.push(FieldMapping::new("note", "Note"));
    fields
}
