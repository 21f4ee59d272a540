// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Reply reformatting: turn raw model markdown into a bulleted display string.
//!
//! # Rules
//!
//! 1. Fenced code (```` ``` … ``` ````, leftmost non-overlapping pairs, may
//!    span lines) is cut out first and copied to the output byte for byte.
//!    An unpaired fence is ordinary text.
//! 2. Outside code, every `**` and every `#` is removed.
//! 3. A list marker at line start (`12.`, or `-`/`•`/`*` followed by
//!    whitespace) becomes the bullet glyph.
//! 4. Blank lines are dropped.  Lines without code get exactly one leading
//!    `➤ `; lines that contain code anywhere are left undecorated.
//!
//! # Implementation
//!
//! [`split_segments`] scans the input once into prose and code segments.
//! [`reformat`] then walks the segments as a line-oriented state machine: a
//! line is open until a newline is seen in prose, and remembers whether any
//! code segment landed on it.  No regex, no placeholder tokens, so nothing in
//! the input can collide with the bookkeeping.
//!
//! ```
//! use chatrelay_core::reformat;
//!
//! assert_eq!(reformat("## Plan\n1. **first**\n\n2. second"), "➤ Plan\n➤ first\n➤ second");
//! ```

/// Glyph prefixed to every display line.
pub const BULLET: char = '➤';

/// Reply used when the model produced no text at all.
pub const FALLBACK_REPLY: &str = "🤖 Sorry, I couldn’t generate a reply.";

const FENCE: &str = "```";

/// A slice of the input, either ordinary prose or a complete fenced block
/// (fences included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Prose(&'a str),
    Code(&'a str),
}

impl<'a> Segment<'a> {
    pub fn as_str(&self) -> &'a str {
        match self {
            Segment::Prose(s) | Segment::Code(s) => s,
        }
    }
}

/// Split `text` into prose and fenced-code segments.
///
/// Concatenating the segments gives back `text` exactly.
pub fn split_segments(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let body_start = open + FENCE.len();
        let Some(close) = rest[body_start..].find(FENCE) else {
            break;
        };
        let end = body_start + close + FENCE.len();
        if open > 0 {
            segments.push(Segment::Prose(&rest[..open]));
        }
        segments.push(Segment::Code(&rest[open..end]));
        rest = &rest[end..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Prose(rest));
    }
    segments
}

/// Reformat raw model output for display.  Empty input yields [`FALLBACK_REPLY`].
pub fn reformat(text: &str) -> String {
    if text.is_empty() {
        return FALLBACK_REPLY.to_string();
    }

    let mut out = LineWriter::default();
    for segment in split_segments(text) {
        match segment {
            Segment::Prose(prose) => {
                for (i, piece) in prose.split('\n').enumerate() {
                    if i > 0 {
                        out.end_line();
                    }
                    out.push_prose(piece);
                }
            }
            Segment::Code(code) => out.push_code(code),
        }
    }
    out.finish()
}

/// [`reformat`] for callers that may have no text at all.
pub fn reformat_opt(text: Option<&str>) -> String {
    reformat(text.unwrap_or_default())
}

#[derive(Default)]
struct LineWriter {
    lines: Vec<String>,
    current: String,
    has_code: bool,
}

impl LineWriter {
    fn push_prose(&mut self, piece: &str) {
        self.current.push_str(&strip_markup(piece));
    }

    fn push_code(&mut self, code: &str) {
        self.current.push_str(code);
        self.has_code = true;
    }

    fn end_line(&mut self) {
        let line = std::mem::take(&mut self.current);
        let has_code = std::mem::replace(&mut self.has_code, false);

        // Code never starts or ends with whitespace, so trimming only
        // touches the surrounding prose.
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let rendered = if has_code { mark_list_item(line) } else { bulletize(line) };
        self.lines.push(rendered);
    }

    fn finish(mut self) -> String {
        self.end_line();
        self.lines.join("\n").trim().to_string()
    }
}

fn strip_markup(prose: &str) -> String {
    prose.replace("**", "").replace('#', "")
}

/// Remainder of `line` after a leading list marker, if there is one.
fn strip_list_marker(line: &str) -> Option<&str> {
    let s = line.trim_start();

    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 && s[digits..].starts_with('.') {
        return Some(&s[digits + 1..]);
    }

    let mut chars = s.chars();
    if let Some('-' | '•' | '*') = chars.next() {
        let rest = chars.as_str();
        if rest.starts_with(char::is_whitespace) {
            return Some(rest);
        }
    }
    None
}

/// Prefix a prose line with exactly one bullet.
fn bulletize(line: &str) -> String {
    let body = strip_list_marker(line).unwrap_or(line);
    let body = body.trim_start_matches(|c: char| c == BULLET || c.is_whitespace());
    if body.is_empty() {
        BULLET.to_string()
    } else {
        format!("{BULLET} {body}")
    }
}

/// Lines carrying code keep their text; only a list marker is swapped for
/// the bullet.
fn mark_list_item(line: &str) -> String {
    match strip_list_marker(line) {
        Some(rest) => format!("{BULLET} {}", rest.trim_start()),
        None => line.to_string(),
    }
}
