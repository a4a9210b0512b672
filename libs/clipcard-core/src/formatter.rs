//! HTML formatting for card field values.
//!
//! The output is a single line of HTML that renders in a flashcard field:
//! list items become indented `<div>`s, paragraphs are joined with `<br>`,
//! sub-headings are bolded and markdown emphasis becomes `<b>`/`<i>`.
//! Long runs are soft-wrapped at whitespace. Formatting an already
//! formatted fragment returns it unchanged.

use std::fmt::Write as _;

const INDENT_PX: usize = 20;
const HEADING_OPEN: &str = "<span style=\"font-weight: bold\">";
const HEADING_CLOSE: &str = "</span>";

/// Formatting toggles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// Soft-wrap runs longer than this many visible characters.
    pub wrap_width: Option<usize>,
    pub lists: bool,
    pub headings: bool,
    pub emphasis: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            wrap_width: Some(80),
            lists: true,
            headings: true,
            emphasis: true,
        }
    }
}

/// List marker split off a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListMarker<'a> {
    /// Indentation in columns (tab = 4).
    pub indent: usize,
    pub marker: &'a str,
    pub rest: &'a str,
}

/// Recognize `•`, `- `, `* ` and `12. ` list lines.
pub(crate) fn split_list_marker(line: &str) -> Option<ListMarker<'_>> {
    let body = line.trim_start();
    let indent = line[..line.len() - body.len()]
        .chars()
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum();

    let marker_len = if body.starts_with('•') {
        '•'.len_utf8()
    } else if body.starts_with("- ") || body.starts_with("* ") {
        1
    } else {
        let digits = body.chars().take_while(|c| c.is_ascii_digit()).count();
        let after = &body[digits..];
        if digits == 0 || digits > 3 || !after.starts_with('.') {
            return None;
        }
        if !after[1..].starts_with(char::is_whitespace) {
            return None;
        }
        digits + 1
    };

    Some(ListMarker {
        indent,
        marker: &body[..marker_len],
        rest: body[marker_len..].trim(),
    })
}

enum Line {
    Blank,
    Text(String),
    Item {
        level: usize,
        marker: String,
        text: String,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    Text,
    Item,
}

/// Format raw field text into an HTML fragment.
pub fn format(text: &str, options: &FormatOptions) -> String {
    let lines: Vec<Line> = text
        .lines()
        .map(|raw| {
            if raw.trim().is_empty() {
                return Line::Blank;
            }
            match split_list_marker(raw).filter(|_| options.lists) {
                Some(item) => Line::Item {
                    level: item.indent / 2,
                    marker: item.marker.to_string(),
                    text: sanitize(item.rest),
                },
                None => Line::Text(sanitize(raw.trim())),
            }
        })
        .collect();

    let mut out = String::with_capacity(text.len() + 32);
    let mut last: Option<Block> = None;
    let mut gap = false;

    for (idx, line) in lines.iter().enumerate() {
        let followed = matches!(lines.get(idx + 1), Some(Line::Text(_) | Line::Item { .. }));
        match line {
            Line::Blank => {
                gap = last.is_some();
                continue;
            }
            Line::Text(text) => {
                out.push_str(match (last, gap) {
                    (None, _) | (Some(Block::Item), false) => "",
                    (Some(Block::Text), false) | (Some(Block::Item), true) => "<br>",
                    (Some(Block::Text), true) => "<br><br>",
                });
                out.push_str(&render_inline(text, followed, options));
                last = Some(Block::Text);
            }
            Line::Item {
                level,
                marker,
                text,
            } => {
                if last.is_some() && gap {
                    out.push_str("<br>");
                }
                let _ = write!(
                    out,
                    "<div style=\"margin-left: {}px\">{}",
                    level * INDENT_PX,
                    marker
                );
                if !text.is_empty() {
                    out.push(' ');
                    out.push_str(&render_inline(text, followed, options));
                }
                out.push_str("</div>");
                last = Some(Block::Item);
            }
        }
        gap = false;
    }

    match options.wrap_width {
        Some(width) if width > 0 => wrap(&out, width),
        _ => out,
    }
}

fn render_inline(text: &str, followed: bool, options: &FormatOptions) -> String {
    let rendered = if options.emphasis {
        apply_emphasis(text)
    } else {
        text.to_string()
    };
    let is_heading = options.headings
        && followed
        && text.chars().count() > 1
        && text.ends_with([':', '：']);
    if is_heading {
        format!("{}{}{}", HEADING_OPEN, rendered, HEADING_CLOSE)
    } else {
        rendered
    }
}

// === Sanitizing ===

const SIMPLE_TAGS: &[&str] = &[
    "<b>", "</b>", "<i>", "</i>", "<br>", "<br/>", "<br />", "</div>", "</span>",
];
const STYLED_TAGS: &[&str] = &["<div style=\"", "<span style=\""];

/// Escape everything except entities and the small set of tags the
/// formatter itself emits.
fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        let keep = match c {
            '<' => allowed_tag_len(rest),
            '&' => entity_len(rest),
            _ => None,
        };
        if let Some(len) = keep {
            out.push_str(&rest[..len]);
            rest = &rest[len..];
            continue;
        }
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn allowed_tag_len(s: &str) -> Option<usize> {
    if let Some(tag) = SIMPLE_TAGS.iter().find(|tag| s.starts_with(**tag)) {
        return Some(tag.len());
    }
    let open = STYLED_TAGS.iter().find(|open| s.starts_with(**open))?;
    let value_start = open.len();
    let value_len = s[value_start..].find('"')?;
    let value = &s[value_start..value_start + value_len];
    if value.contains(['<', '>', '*', '&']) {
        return None;
    }
    s[value_start + value_len..]
        .starts_with("\">")
        .then_some(value_start + value_len + 2)
}

fn entity_len(s: &str) -> Option<usize> {
    let body = s.strip_prefix('&')?;
    let end = body.find(';')?;
    let name = &body[..end];
    let valid = match name.strip_prefix('#') {
        Some(num) => match num.strip_prefix(['x', 'X']) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()),
        },
        None => {
            !name.is_empty() && name.len() <= 32 && name.chars().all(|c| c.is_ascii_alphanumeric())
        }
    };
    valid.then_some(end + 2)
}

// === Emphasis ===

/// Replace `**x**` and `*x*` pairs until none are left. Content must hug
/// the delimiters and may not contain markup, so pairs never span lines.
fn apply_emphasis(text: &str) -> String {
    let mut out = text.to_string();
    while let Some((open, close)) = find_bold(&out) {
        out = format!(
            "{}<b>{}</b>{}",
            &out[..open],
            &out[open + 2..close],
            &out[close + 2..]
        );
    }
    while let Some((open, close)) = find_italic(&out) {
        out = format!(
            "{}<i>{}</i>{}",
            &out[..open],
            &out[open + 1..close],
            &out[close + 1..]
        );
    }
    out
}

fn valid_emphasis(content: &str) -> bool {
    !content.is_empty()
        && !content.starts_with(char::is_whitespace)
        && !content.ends_with(char::is_whitespace)
        && !content.contains(['<', '>'])
}

fn find_bold(text: &str) -> Option<(usize, usize)> {
    let delimiters: Vec<usize> = text.match_indices("**").map(|(i, _)| i).collect();
    delimiters
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .find(|&(open, close)| valid_emphasis(&text[open + 2..close]))
}

fn find_italic(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let singles: Vec<usize> = bytes
        .iter()
        .enumerate()
        .filter(|&(i, &b)| {
            b == b'*'
                && (i == 0 || bytes[i - 1] != b'*')
                && bytes.get(i + 1).map_or(true, |&next| next != b'*')
        })
        .map(|(i, _)| i)
        .collect();
    singles
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .find(|&(open, close)| valid_emphasis(&text[open + 1..close]))
}

// === Wrapping ===

#[derive(Clone, Copy)]
enum Token<'a> {
    Tag(&'a str),
    Entity(&'a str),
    Char(char),
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        let token = match c {
            '<' => allowed_tag_len(rest).map(|len| Token::Tag(&rest[..len])),
            '&' => entity_len(rest).map(|len| Token::Entity(&rest[..len])),
            _ => None,
        }
        .unwrap_or(Token::Char(c));
        let len = match token {
            Token::Tag(s) | Token::Entity(s) => s.len(),
            Token::Char(c) => c.len_utf8(),
        };
        tokens.push(token);
        rest = &rest[len..];
    }
    tokens
}

fn is_line_boundary(tag: &str) -> bool {
    tag.starts_with("<br") || tag.starts_with("<div") || tag == "</div>"
}

/// Insert `<br>` so that every run between line boundaries fits in
/// `width` visible characters, breaking only at whitespace.
fn wrap(html: &str, width: usize) -> String {
    let tokens = tokenize(html);
    let mut out = String::with_capacity(html.len() + 16);
    let mut start = 0;
    for (idx, token) in tokens.iter().enumerate() {
        if let Token::Tag(tag) = token {
            if is_line_boundary(tag) {
                wrap_run(&tokens[start..idx], width, &mut out);
                out.push_str(tag);
                start = idx + 1;
            }
        }
    }
    wrap_run(&tokens[start..], width, &mut out);
    out
}

fn wrap_run(run: &[Token<'_>], width: usize, out: &mut String) {
    let mut breaks = Vec::new();
    let mut start = 0;
    loop {
        let mut visible = 0;
        let mut within = None;
        let mut beyond = None;
        for (offset, token) in run[start..].iter().enumerate() {
            match token {
                Token::Tag(_) => {}
                Token::Entity(_) => visible += 1,
                Token::Char(c) => {
                    if c.is_whitespace() && visible > 0 {
                        if visible <= width {
                            within = Some(start + offset);
                        } else if beyond.is_none() {
                            beyond = Some(start + offset);
                        }
                    }
                    visible += 1;
                }
            }
        }
        if visible <= width {
            break;
        }
        match within.or(beyond) {
            Some(at) => {
                breaks.push(at);
                start = at + 1;
            }
            None => break,
        }
    }

    for (idx, token) in run.iter().enumerate() {
        if breaks.contains(&idx) {
            out.push_str("<br>");
            continue;
        }
        match token {
            Token::Tag(s) | Token::Entity(s) => out.push_str(s),
            Token::Char(c) => out.push(*c),
        }
    }
}
