//! Output routing.
//!
//! Rendered text is split into named destinations by output tags:
//!
//! ```text
//! <output "leaf1.cfg">          start a destination (index 0, format text)
//! <output:json 'a b'>[2]        quoted name, explicit format and index
//! </output>                     return to the enclosing destination
//! </output\n>                   same, then append one empty line
//! ```
//!
//! Each line is tokenised first ([`tokenize`]) and the tokens drive a stack
//! whose bottom is the row's default destination. Buffers are keyed by index
//! and name (the format only labels the result) and merged by
//! [`OutputRouter::finish`]: per name, in ascending index order, in row
//! order within one index.

use std::collections::BTreeMap;

use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::error::{FxError, Result};

/// Format of destinations that don't declare one.
pub const DEFAULT_FORMAT: &str = "text";

static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?i)<output(?::(?P<format>[A-Za-z0-9_.+-]+))?[ \t]+(?P<name>"[^"]*"|'[^']*'|[^ \t>"']+)[ \t]*>"#,
        r#"(?:\[[ \t]*(?P<index>-?\d+)[ \t]*\])?"#,
        r#"|(?P<close></output[ \t]*>)"#,
        r#"|(?P<blank></output\\n>)"#,
    ))
    .unwrap()
});

/// Where a line of rendered text goes.
///
/// Ordering is by index first, which is the order buffers are merged in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Destination {
    pub index: i64,
    pub name: String,
    pub format: String,
}

impl Destination {
    /// A text destination at index 0.
    pub fn new(name: impl Into<String>) -> Self {
        Destination {
            index: 0,
            name: name.into(),
            format: DEFAULT_FORMAT.to_string(),
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_index(mut self, index: i64) -> Self {
        self.index = index;
        self
    }
}

/// One lexical piece of a rendered line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    Open(Destination),
    Close { blank_line: bool },
}

/// Splits a line into text and tag tokens.
///
/// A line without tags is a single `Text` token, even when empty. On lines
/// with tags, whitespace-only text between tags is dropped.
pub fn tokenize(line: &str) -> Result<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in MARKER.captures_iter(line) {
        let Some(whole) = caps.get(0) else { continue };
        push_text(&mut tokens, &line[last..whole.start()]);
        last = whole.end();

        let token = if caps.name("close").is_some() {
            Token::Close { blank_line: false }
        } else if caps.name("blank").is_some() {
            Token::Close { blank_line: true }
        } else {
            Token::Open(open_marker(&caps)?)
        };
        tokens.push(token);
    }

    if tokens.is_empty() {
        return Ok(vec![Token::Text(line)]);
    }
    push_text(&mut tokens, &line[last..]);
    Ok(tokens)
}

fn push_text<'a>(tokens: &mut Vec<Token<'a>>, text: &'a str) {
    if !text.trim().is_empty() {
        tokens.push(Token::Text(text));
    }
}

fn open_marker(caps: &Captures<'_>) -> Result<Destination> {
    let raw = caps.name("name").map_or("", |m| m.as_str());
    let name = jinjafx_data::strip_quotes(raw).trim();
    if name.is_empty() {
        return Err(FxError::InvalidOutputName(raw.to_string()));
    }

    let index = match caps.name("index") {
        Some(m) => m
            .as_str()
            .parse()
            .map_err(|_| FxError::InvalidOutputName(caps[0].to_string()))?,
        None => 0,
    };
    let format = caps
        .name("format")
        .map_or(DEFAULT_FORMAT, |m| m.as_str())
        .to_lowercase();

    Ok(Destination {
        index,
        name: name.to_string(),
        format,
    })
}

/// A finished destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Output {
    pub format: String,
    pub lines: Vec<String>,
}

impl Output {
    /// Lines joined with `\n`, with a trailing newline.
    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// All non-blank destinations of a run, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Outputs(BTreeMap<String, Output>);

impl Outputs {
    pub fn get(&self, name: &str) -> Option<&Output> {
        self.0.get(name)
    }

    /// Rendered text of one destination.
    pub fn text(&self, name: &str) -> Option<String> {
        self.0.get(name).map(Output::text)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Output)> {
        self.0.iter().map(|(name, output)| (name.as_str(), output))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Output> {
        self.0
    }
}

/// Lines sent to one `(index, name)`, labelled with the first format seen.
#[derive(Debug)]
struct Buffer {
    format: String,
    lines: Vec<String>,
}

/// Collects routed lines across every row of a run.
#[derive(Debug, Default)]
pub struct OutputRouter {
    buffers: BTreeMap<(i64, String), Buffer>,
}

impl OutputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes one row's rendered text, starting in `default`.
    ///
    /// Nothing is kept from a row whose tags don't balance.
    pub fn route(&mut self, default: Destination, text: &str) -> Result<()> {
        if default.name.trim().is_empty() {
            return Err(FxError::InvalidOutputName(default.name));
        }

        let mut stack = vec![default];
        let mut staged: Vec<(Destination, String)> = Vec::new();

        for line in text.lines() {
            for token in tokenize(line)? {
                match token {
                    Token::Text(text) => {
                        if let Some(top) = stack.last() {
                            staged.push((top.clone(), text.to_string()));
                        }
                    }
                    Token::Open(destination) => stack.push(destination),
                    Token::Close { blank_line } => {
                        if stack.len() <= 1 {
                            return Err(FxError::UnbalancedOutputTags);
                        }
                        if let Some(closed) = stack.pop() {
                            if blank_line {
                                staged.push((closed, String::new()));
                            }
                        }
                    }
                }
            }
        }

        if stack.len() != 1 {
            return Err(FxError::UnbalancedOutputTags);
        }

        debug!("routed {} lines", staged.len());
        for (destination, line) in staged {
            let Destination { index, name, format } = destination;
            self.buffers
                .entry((index, name))
                .or_insert_with(|| Buffer {
                    format,
                    lines: Vec::new(),
                })
                .lines
                .push(line);
        }
        Ok(())
    }

    /// Merges buffers per destination name in ascending index order and drops
    /// destinations that hold only whitespace.
    pub fn finish(self) -> Outputs {
        let mut outputs: BTreeMap<String, Output> = BTreeMap::new();

        for ((_, name), buffer) in self.buffers {
            let Buffer { format, lines } = buffer;
            outputs
                .entry(name)
                .or_insert_with(|| Output {
                    format,
                    lines: Vec::new(),
                })
                .lines
                .extend(lines);
        }

        outputs.retain(|_, output| output.lines.iter().any(|l| !l.trim().is_empty()));
        Outputs(outputs)
    }
}
