//! Header line parsing and delimiter handling.
//!
//! The first non-comment line of the data names the columns. Each name can
//! carry a type annotation:
//!
//! | Header | Type |
//! |--------|------|
//! | `name` | string |
//! | `name:int` / `name:float` | number |
//! | `[name]` | `;`-separated list of strings |
//! | `[name:int]` / `[name:float]` | list of numbers |
//!
//! The delimiter (comma or tab) is picked per header line by counting both
//! characters; data lines are split the same way.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DataError, Result};
use crate::value::{FieldKind, FieldType};

static COMMA_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*,[ \t]*").unwrap());
static TAB_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r" *\t *").unwrap());
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Column delimiter style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    /// Picks the delimiter a line uses: comma when it has more commas than tabs.
    pub fn detect(line: &str) -> Self {
        let commas = line.matches(',').count();
        let tabs = line.matches('\t').count();
        if commas > tabs {
            Delimiter::Comma
        } else {
            Delimiter::Tab
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            Delimiter::Comma => &COMMA_SPLIT,
            Delimiter::Tab => &TAB_SPLIT,
        }
    }

    /// Splits a line into quote-stripped cells.
    ///
    /// Delimiters inside a double-quoted cell don't split it.
    pub fn split(self, line: &str) -> Vec<String> {
        let mut cells = Vec::new();
        let mut last = 0;
        for m in self.regex().find_iter(line) {
            if line[..m.start()].matches('"').count() % 2 == 1 {
                continue;
            }
            cells.push(strip_quotes(&line[last..m.start()]).to_string());
            last = m.end();
        }
        cells.push(strip_quotes(&line[last..]).to_string());
        cells
    }
}

/// Removes one pair of matching surrounding quotes (`"..."` or `'...'`).
pub fn strip_quotes(cell: &str) -> &str {
    let bytes = cell.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'"' || first == b'\'') && bytes[bytes.len() - 1] == first {
            return &cell[1..cell.len() - 1];
        }
    }
    cell
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub field_type: FieldType,
}

impl HeaderField {
    fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(DataError::EmptyHeader);
        }

        let (inner, list) = match raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            Some(inner) => (inner, true),
            None => (raw, false),
        };

        let (name, kind) = match inner.split_once(':') {
            Some((name, annotation)) => {
                let kind = FieldKind::from_annotation(annotation)
                    .ok_or_else(|| DataError::InvalidHeader(raw.to_string()))?;
                (name, kind)
            }
            None => (inner, FieldKind::Str),
        };

        if name.is_empty() {
            return Err(DataError::EmptyHeader);
        }
        if !IDENTIFIER.is_match(name) {
            return Err(DataError::InvalidHeader(raw.to_string()));
        }

        Ok(HeaderField {
            name: name.to_string(),
            field_type: FieldType { kind, list },
        })
    }
}

/// Parsed header: ordered typed fields plus the delimiter used by the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSchema {
    fields: Vec<HeaderField>,
    delimiter: Delimiter,
}

impl HeaderSchema {
    /// Parses a header line.
    ///
    /// Trailing delimiters are ignored. Empty, malformed and duplicate names
    /// are rejected.
    pub fn parse(line: &str) -> Result<Self> {
        let delimiter = Delimiter::detect(line);
        let line = trim_trailing_delimiters(line.trim(), delimiter);

        let fields = delimiter
            .split(line)
            .iter()
            .map(|raw| HeaderField::parse(raw))
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(DataError::DuplicateHeader(field.name.clone()));
            }
        }

        Ok(HeaderSchema { fields, delimiter })
    }

    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    /// Field names in column order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Column index of a field name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Splits a data line into exactly one cell per column.
    ///
    /// Missing trailing cells are empty; surplus cells are dropped.
    pub fn split_line(&self, line: &str) -> Vec<String> {
        let mut cells = self.delimiter.split(line);
        cells.resize(self.fields.len(), String::new());
        cells
    }
}

fn trim_trailing_delimiters(line: &str, delimiter: Delimiter) -> &str {
    let mut end = line.len();
    while let Some(m) = delimiter
        .regex()
        .find_iter(&line[..end])
        .last()
        .filter(|m| m.end() == end && m.start() < end)
    {
        end = m.start();
    }
    &line[..end]
}
