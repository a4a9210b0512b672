//! Line-oriented parsers for the supported clip layouts.
//!
//! # Formats
//! ```text
//! question: What is 2+2?          • question: What is 2+2?
//! optionA: 3                      • options:
//! optionB: 4                      A. 3
//! answer: B                       B. 4
//! note: Basic arithmetic.         • answer: B
//! Notes may span lines.           • notes: Basic arithmetic.
//! ```
//!
//! The note layouts use `Q:` / `A:`, `Term:` / `Definition:`, and a titled
//! bulleted list. Keys are case-insensitive. Single-line keys consume the
//! rest of their line; multi-line keys consume every following line until the
//! next recognized key.

use crate::dedup::fingerprint;
use crate::error::{ParseError, Result};
use crate::formatter::split_list_marker;
use crate::types::{ContentKind, ParsedContent};
use chrono::Utc;

const OPTION_LETTERS: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];

/// Parse a clip already classified as `kind`.
pub fn parse(kind: ContentKind, text: &str) -> Result<ParsedContent> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let fields = match kind {
        ContentKind::Mcq => mcq_fields(scan(text, mcq_line))?,
        ContentKind::BulletMcq => mcq_fields(scan(text, BulletLines::default().into_fn()))?,
        ContentKind::QuestionAnswer => {
            let mut scanned = scan(text, qa_line);
            vec![
                required(&mut scanned, Field::Question, "question")?,
                required(&mut scanned, Field::Answer, "answer")?,
            ]
        }
        ContentKind::Definition => {
            let mut scanned = scan(text, definition_line);
            vec![
                required(&mut scanned, Field::Term, "term")?,
                required(&mut scanned, Field::Definition, "definition")?,
            ]
        }
        ContentKind::List => list_fields(text)?,
    };

    Ok(ParsedContent {
        kind,
        fields,
        fingerprint: fingerprint(text),
        created_at: Utc::now(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Question,
    Option(char),
    Options,
    Answer,
    Note,
    Term,
    Definition,
}

enum LineType<'a> {
    Key {
        field: Field,
        rest: &'a str,
        multiline: bool,
    },
    Text(&'a str),
    Empty,
}

/// Collected values; a repeated key replaces the earlier value.
#[derive(Default)]
struct Scanned {
    values: Vec<(Field, String)>,
}

impl Scanned {
    fn set(&mut self, field: Field, value: String) {
        match self.values.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.values.push((field, value)),
        }
    }

    fn take(&mut self, field: Field) -> Option<String> {
        let idx = self.values.iter().position(|(f, _)| *f == field)?;
        Some(self.values.remove(idx).1).filter(|v| !v.is_empty())
    }
}

struct Scanner {
    scanned: Scanned,
    current: Option<Field>,
    buffer: Vec<String>,
}

impl Scanner {
    fn new() -> Self {
        Self {
            scanned: Scanned::default(),
            current: None,
            buffer: Vec::new(),
        }
    }

    fn process(&mut self, line: LineType<'_>) {
        match line {
            LineType::Key {
                field,
                rest,
                multiline,
            } => {
                self.flush_buffer();
                if multiline {
                    self.current = Some(field);
                    self.buffer.push(rest.trim().to_string());
                } else {
                    self.current = None;
                    self.scanned.set(field, rest.trim().to_string());
                }
            }
            LineType::Text(text) if self.current.is_some() => {
                self.buffer.push(text.trim_end().to_string())
            }
            LineType::Empty if self.current.is_some() => self.buffer.push(String::new()),
            _ => {}
        }
    }

    fn flush_buffer(&mut self) {
        if let Some(field) = self.current.take() {
            let content = self.buffer.join("\n");
            self.scanned.set(field, trim_block(&content));
        }
        self.buffer.clear();
    }

    fn finalize(mut self) -> Scanned {
        self.flush_buffer();
        self.scanned
    }
}

fn scan<'a>(text: &'a str, mut classify: impl FnMut(&'a str) -> LineType<'a>) -> Scanned {
    let mut scanner = Scanner::new();
    for line in text.lines() {
        scanner.process(classify(line));
    }
    scanner.finalize()
}

/// Trim surrounding whitespace and blank lines while keeping the
/// indentation of inner lines.
fn trim_block(content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n").trim().to_string(),
        _ => String::new(),
    }
}

/// Case-insensitive ASCII prefix strip.
fn strip_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let head = line.get(..key.len())?;
    head.eq_ignore_ascii_case(key).then(|| &line[key.len()..])
}

fn blank_or_text(line: &str) -> LineType<'_> {
    if line.trim().is_empty() {
        LineType::Empty
    } else {
        LineType::Text(line)
    }
}

fn mcq_line(line: &str) -> LineType<'_> {
    let trimmed = line.trim();

    if let Some(rest) = strip_key(trimmed, "question:") {
        return LineType::Key {
            field: Field::Question,
            rest,
            multiline: false,
        };
    }
    if let Some(rest) = strip_key(trimmed, "option") {
        let mut chars = rest.chars();
        if let (Some(letter), Some(':')) = (chars.next(), chars.next()) {
            let letter = letter.to_ascii_uppercase();
            if OPTION_LETTERS.contains(&letter) {
                return LineType::Key {
                    field: Field::Option(letter),
                    rest: &rest[2..],
                    multiline: false,
                };
            }
        }
    }
    if let Some(rest) = strip_key(trimmed, "answer:") {
        return LineType::Key {
            field: Field::Answer,
            rest,
            multiline: false,
        };
    }
    if let Some(rest) = strip_key(trimmed, "notes:").or_else(|| strip_key(trimmed, "note:")) {
        return LineType::Key {
            field: Field::Note,
            rest,
            multiline: true,
        };
    }
    blank_or_text(line)
}

/// Bullet layout: lettered option lines count only inside `• options:`.
#[derive(Default)]
struct BulletLines {
    in_options: bool,
}

impl BulletLines {
    fn into_fn<'a>(mut self) -> impl FnMut(&'a str) -> LineType<'a> {
        move |line| self.classify(line)
    }

    fn classify<'a>(&mut self, line: &'a str) -> LineType<'a> {
        let trimmed = line.trim();

        // The bullet is optional on keys: `answer: C` is accepted too.
        let body = trimmed
            .strip_prefix('•')
            .map(str::trim_start)
            .unwrap_or(trimmed);
        let keys: [(&str, Field, bool); 5] = [
            ("question:", Field::Question, false),
            ("options:", Field::Options, false),
            ("answer:", Field::Answer, false),
            ("notes:", Field::Note, true),
            ("note:", Field::Note, true),
        ];
        for (key, field, multiline) in keys {
            if let Some(rest) = strip_key(body, key) {
                self.in_options = field == Field::Options;
                return LineType::Key {
                    field,
                    rest,
                    multiline,
                };
            }
        }

        if self.in_options {
            if let Some((letter, rest)) = lettered_option(trimmed) {
                return LineType::Key {
                    field: Field::Option(letter),
                    rest,
                    multiline: false,
                };
            }
        }
        blank_or_text(line)
    }
}

/// `A. text` or `A) text`.
fn lettered_option(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let delimiter = chars.next()?;
    if !OPTION_LETTERS.contains(&letter) || !matches!(delimiter, '.' | ')') {
        return None;
    }
    let rest = &line[2..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((letter, rest))
}

fn qa_line(line: &str) -> LineType<'_> {
    let trimmed = line.trim();
    if let Some(rest) = strip_key(trimmed, "q:") {
        LineType::Key {
            field: Field::Question,
            rest,
            multiline: true,
        }
    } else if let Some(rest) = strip_key(trimmed, "a:") {
        LineType::Key {
            field: Field::Answer,
            rest,
            multiline: true,
        }
    } else {
        blank_or_text(line)
    }
}

fn definition_line(line: &str) -> LineType<'_> {
    let trimmed = line.trim();
    if let Some(rest) = strip_key(trimmed, "term:") {
        LineType::Key {
            field: Field::Term,
            rest,
            multiline: false,
        }
    } else if let Some(rest) = strip_key(trimmed, "definition:") {
        LineType::Key {
            field: Field::Definition,
            rest,
            multiline: true,
        }
    } else {
        blank_or_text(line)
    }
}

fn required(
    scanned: &mut Scanned,
    field: Field,
    name: &'static str,
) -> Result<(String, String)> {
    scanned
        .take(field)
        .map(|value| (name.to_string(), value))
        .ok_or(ParseError::MissingField { field: name })
}

fn mcq_fields(mut scanned: Scanned) -> Result<Vec<(String, String)>> {
    let question = scanned.take(Field::Question).ok_or(ParseError::MissingQuestion)?;

    let options: Vec<(char, String)> = OPTION_LETTERS
        .iter()
        .filter_map(|&letter| scanned.take(Field::Option(letter)).map(|v| (letter, v)))
        .collect();
    if options.len() < 2 {
        return Err(ParseError::TooFewOptions {
            found: options.len(),
        });
    }

    let raw_answer = scanned.take(Field::Answer).ok_or(ParseError::MissingAnswer)?;
    let available: String = options.iter().map(|(letter, _)| *letter).collect();
    let answer = answer_letter(&raw_answer)
        .filter(|letter| available.contains(*letter))
        .ok_or_else(|| ParseError::InvalidAnswer {
            answer: raw_answer.clone(),
            available: available.clone(),
        })?;

    let mut fields = vec![("question".to_string(), question)];
    fields.extend(
        options
            .into_iter()
            .map(|(letter, text)| (format!("option{}", letter), text)),
    );
    fields.push(("answer".to_string(), answer.to_string()));
    if let Some(note) = scanned.take(Field::Note) {
        fields.push(("note".to_string(), note));
    }
    Ok(fields)
}

/// Accepts `B`, `b`, `B.`, `(B)`, `B) text`.
fn answer_letter(answer: &str) -> Option<char> {
    let answer = answer.trim().trim_start_matches('(');
    let mut chars = answer.chars();
    let letter = chars.next()?;
    if !letter.is_ascii_alphabetic() {
        return None;
    }
    match chars.next() {
        None => Some(letter.to_ascii_uppercase()),
        Some(c) if matches!(c, '.' | ')') || c.is_whitespace() => Some(letter.to_ascii_uppercase()),
        Some(_) => None,
    }
}

fn list_fields(text: &str) -> Result<Vec<(String, String)>> {
    let mut title: Option<String> = None;
    let mut items: Vec<String> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = strip_key(trimmed, "list:") {
            title = Some(rest.trim().to_string());
        } else if split_list_marker(line).is_some() {
            items.push(line.trim_end().replace('\t', "    "));
        } else if title.is_none() && items.is_empty() {
            title = Some(trimmed.trim_end_matches([':', '：']).trim().to_string());
        } else if let Some(last) = items.last_mut() {
            last.push(' ');
            last.push_str(trimmed);
        }
    }

    let title = title
        .filter(|t| !t.is_empty())
        .ok_or(ParseError::MissingField { field: "title" })?;
    if items.is_empty() {
        return Err(ParseError::MissingField { field: "items" });
    }

    let indent = items
        .iter()
        .map(|item| item.len() - item.trim_start().len())
        .min()
        .unwrap_or(0);
    let items = items
        .iter()
        .map(|item| item.get(indent..).unwrap_or_else(|| item.trim_start()))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(vec![
        ("title".to_string(), title),
        ("items".to_string(), items),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fields(parsed: &ParsedContent) -> Vec<(&str, &str)> {
        parsed
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn parse_line_prefixed_mcq() {
        let input = "question: 2+2?\noptionA: 3\noptionB: 4\nanswer: B\nnote: basic";
        let parsed = parse(ContentKind::Mcq, input).unwrap();
        assert_eq!(
            fields(&parsed),
            vec![
                ("question", "2+2?"),
                ("optionA", "3"),
                ("optionB", "4"),
                ("answer", "B"),
                ("note", "basic"),
            ]
        );
        assert_eq!(parsed.kind, ContentKind::Mcq);
        assert_eq!(parsed.fingerprint, fingerprint(input));
    }

    #[test]
    fn parse_multiline_note_preserves_blank_lines() {
        let input = "question: Q\noptionA: a\noptionB: b\nanswer: a\nnote: Line 1\nLine 2\n\nLine 4\n\n";
        let parsed = parse(ContentKind::Mcq, input).unwrap();
        assert_eq!(parsed.get("note"), Some("Line 1\nLine 2\n\nLine 4"));
        assert_eq!(parsed.get("answer"), Some("A"));
    }

    #[test]
    fn note_stops_at_next_key() {
        let input = "note: first\nmore\nquestion: Q\noptionA: a\noptionB: b\nanswer: B";
        let parsed = parse(ContentKind::Mcq, input).unwrap();
        assert_eq!(parsed.get("note"), Some("first\nmore"));
        assert_eq!(parsed.get("question"), Some("Q"));
    }

    #[test]
    fn keys_are_case_insensitive() {
        let input = "Question: Q\nOPTIONA: a\nOptionb: b\nAnswer: b";
        let parsed = parse(ContentKind::Mcq, input).unwrap();
        assert_eq!(parsed.get("optionB"), Some("b"));
        assert_eq!(parsed.get("answer"), Some("B"));
    }

    #[test]
    fn reject_missing_answer() {
        let input = "question: 2+2?\noptionA: 3\noptionB: 4\nnote: basic";
        assert_eq!(parse(ContentKind::Mcq, input).unwrap_err(), ParseError::MissingAnswer);
    }

    #[test]
    fn reject_missing_question() {
        let input = "optionA: 3\noptionB: 4\nanswer: A";
        assert_eq!(parse(ContentKind::Mcq, input).unwrap_err(), ParseError::MissingQuestion);
    }

    #[test]
    fn reject_single_option() {
        let input = "question: Q\noptionA: only\nanswer: A";
        assert_eq!(
            parse(ContentKind::Mcq, input).unwrap_err(),
            ParseError::TooFewOptions { found: 1 }
        );
    }

    #[test]
    fn reject_answer_outside_populated_options() {
        let input = "question: Q\noptionA: a\noptionB: b\nanswer: E";
        assert!(matches!(
            parse(ContentKind::Mcq, input),
            Err(ParseError::InvalidAnswer { ref available, .. }) if available == "AB"
        ));
    }

    #[test]
    fn reject_blank_answer() {
        let input = "question: Q\noptionA: a\noptionB: b\nanswer:   ";
        assert_eq!(parse(ContentKind::Mcq, input).unwrap_err(), ParseError::MissingAnswer);
    }

    #[test]
    fn answer_forms_are_normalized() {
        for (raw, expected) in [("(c)", 'C'), ("C.", 'C'), ("c) 5", 'C'), (" C ", 'C')] {
            assert_eq!(answer_letter(raw), Some(expected), "{raw}");
        }
        assert_eq!(answer_letter("Cats"), None);
        assert_eq!(answer_letter(""), None);
    }

    #[test]
    fn parse_bullet_mcq_with_four_options() {
        let input = "• question: Which planet is red?\n• options:\nA. Venus\nB. Earth\nC. Mars\nD. Jupiter\n• answer: C\n• notes: Iron oxide.\nDust storms too.";
        let parsed = parse(ContentKind::BulletMcq, input).unwrap();
        assert_eq!(
            fields(&parsed),
            vec![
                ("question", "Which planet is red?"),
                ("optionA", "Venus"),
                ("optionB", "Earth"),
                ("optionC", "Mars"),
                ("optionD", "Jupiter"),
                ("answer", "C"),
                ("note", "Iron oxide.\nDust storms too."),
            ]
        );
    }

    #[test]
    fn bullet_mcq_accepts_plain_answer_key() {
        let input = "• question: Pick C\n• options:\nA) a\nB) b\nC) c\nD) d\nanswer: C";
        let parsed = parse(ContentKind::BulletMcq, input).unwrap();
        assert_eq!(parsed.get("answer"), Some("C"));
        assert_eq!(parsed.get("optionD"), Some("d"));
        assert_eq!(parsed.get("optionE"), None);
    }

    #[test]
    fn lettered_lines_outside_options_are_plain_text() {
        let input = "• question: Q\n• options:\nA. one\nB. two\n• answer: A\n• notes: Why\nA. because";
        let parsed = parse(ContentKind::BulletMcq, input).unwrap();
        assert_eq!(parsed.get("note"), Some("Why\nA. because"));
        assert_eq!(parsed.get("optionA"), Some("one"));
    }

    #[test]
    fn repeated_key_overrides() {
        let input = "question: first\nquestion: second\noptionA: a\noptionB: b\nanswer: A";
        let parsed = parse(ContentKind::Mcq, input).unwrap();
        assert_eq!(parsed.get("question"), Some("second"));
    }

    #[test]
    fn parse_question_answer_note() {
        let input = "Q: Explain borrowing\nA: Line 1\nLine 2";
        let parsed = parse(ContentKind::QuestionAnswer, input).unwrap();
        assert_eq!(
            fields(&parsed),
            vec![("question", "Explain borrowing"), ("answer", "Line 1\nLine 2")]
        );
    }

    #[test]
    fn question_answer_requires_answer() {
        assert_eq!(
            parse(ContentKind::QuestionAnswer, "Q: only").unwrap_err(),
            ParseError::MissingField { field: "answer" }
        );
    }

    #[test]
    fn parse_definition_note() {
        let input = "Term: Ownership\nDefinition: Each value has one owner.\n\nDropped at scope end.";
        let parsed = parse(ContentKind::Definition, input).unwrap();
        assert_eq!(parsed.get("term"), Some("Ownership"));
        assert_eq!(
            parsed.get("definition"),
            Some("Each value has one owner.\n\nDropped at scope end.")
        );
    }

    #[test]
    fn parse_titled_list() {
        let input = "Primary colours:\n  • red\n  • green\n    - lime\n  • blue";
        let parsed = parse(ContentKind::List, input).unwrap();
        assert_eq!(parsed.get("title"), Some("Primary colours"));
        assert_eq!(parsed.get("items"), Some("• red\n• green\n  - lime\n• blue"));
    }

    #[test]
    fn list_title_from_key_and_continuation_lines() {
        let input = "list: Steps\n1. boil water\n   then wait\n2. pour";
        let parsed = parse(ContentKind::List, input).unwrap();
        assert_eq!(parsed.get("title"), Some("Steps"));
        assert_eq!(parsed.get("items"), Some("1. boil water then wait\n2. pour"));
    }

    #[test]
    fn list_without_title_is_rejected() {
        assert_eq!(
            parse(ContentKind::List, "• a\n• b").unwrap_err(),
            ParseError::MissingField { field: "title" }
        );
    }

    #[test]
    fn empty_clip_is_rejected() {
        assert_eq!(parse(ContentKind::Mcq, "  \n ").unwrap_err(), ParseError::Empty);
    }
}
