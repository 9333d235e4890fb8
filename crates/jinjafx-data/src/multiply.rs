//! Row multiplication.
//!
//! [`RowMultiplier::multiply`] turns one input line into every concrete row
//! it encodes:
//!
//! 1. each column is expanded independently (see [`crate::expand`]);
//! 2. the line is replicated once per variant of its first multi-variant
//!    column until every column holds exactly one variant;
//! 3. each resolved row gets its back-references (`\0`, `\1`, ...)
//!    substituted from the row's group table, then counters and data loops,
//!    then padding, then the remaining operator escapes are removed;
//! 4. typed columns are coerced.
//!
//! The group table of a row is the column-major concatenation of every
//! column's group selections, indexed from zero.

use std::collections::VecDeque;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::counter::{apply_padding, unescape_operators, CounterRegistry};
use crate::error::Result;
use crate::expand::{Expander, Expansion};
use crate::header::HeaderSchema;
use crate::value::CellValue;

static BACK_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\(\d+)").unwrap());

/// One fully resolved, typed row.
///
/// `origin` identifies the input line the row was multiplied from. It scopes
/// counter state and is never bound to templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcreteRow {
    #[serde(skip)]
    origin: usize,
    values: Vec<CellValue>,
}

impl ConcreteRow {
    pub fn new(origin: usize, values: Vec<CellValue>) -> Self {
        ConcreteRow { origin, values }
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn get(&self, column: usize) -> Option<&CellValue> {
        self.values.get(column)
    }
}

/// Column state while a line is being multiplied.
#[derive(Debug, Clone)]
enum Cell {
    Resolved(Expansion),
    Choices(Vec<Expansion>),
}

impl Cell {
    fn from_expansions(mut expansions: Vec<Expansion>) -> Self {
        if expansions.len() == 1 {
            Cell::Resolved(expansions.remove(0))
        } else {
            Cell::Choices(expansions)
        }
    }
}

/// Multiplies input lines into concrete rows for one run.
#[derive(Debug)]
pub struct RowMultiplier<'a> {
    schema: &'a HeaderSchema,
    counters: CounterRegistry,
    origin: usize,
}

impl<'a> RowMultiplier<'a> {
    pub fn new(schema: &'a HeaderSchema) -> Self {
        RowMultiplier {
            schema,
            counters: CounterRegistry::new(),
            origin: 0,
        }
    }

    /// Counter and loop state accumulated so far.
    pub fn counters(&self) -> &CounterRegistry {
        &self.counters
    }

    /// Multiplies one raw data line.
    pub fn multiply(&mut self, line: &str, expander: &mut Expander) -> Result<Vec<ConcreteRow>> {
        self.origin += 1;
        let origin = self.origin;

        let cells = self
            .schema
            .split_line(line)
            .iter()
            .map(|cell| expander.expand(cell).map(Cell::from_expansions))
            .collect::<Result<Vec<_>>>()?;

        let mut pending = VecDeque::from([cells]);
        let mut rows = Vec::new();

        while let Some(row) = pending.pop_front() {
            let Some(column) = row.iter().position(|c| matches!(c, Cell::Choices(_))) else {
                rows.push(self.resolve(origin, row)?);
                continue;
            };

            let Cell::Choices(choices) = &row[column] else {
                continue;
            };
            let replicas: Vec<Vec<Cell>> = choices
                .iter()
                .map(|choice| {
                    let mut replica = row.clone();
                    replica[column] = Cell::Resolved(choice.clone());
                    replica
                })
                .collect();

            for replica in replicas.into_iter().rev() {
                pending.push_front(replica);
            }
        }

        debug!("line {} multiplied into {} rows", origin, rows.len());
        Ok(rows)
    }

    fn resolve(&mut self, origin: usize, row: Vec<Cell>) -> Result<ConcreteRow> {
        let schema = self.schema;
        let expansions: Vec<Expansion> = row
            .into_iter()
            .filter_map(|cell| match cell {
                Cell::Resolved(expansion) => Some(expansion),
                Cell::Choices(_) => None,
            })
            .collect();

        let groups: Vec<&str> = expansions
            .iter()
            .flat_map(|e| e.groups.iter().map(String::as_str))
            .collect();

        let values = expansions
            .iter()
            .zip(schema.fields())
            .enumerate()
            .map(|(column, (expansion, field))| {
                let text = substitute_back_references(&expansion.value, &groups);
                let text = self.counters.substitute(origin, column, &text)?;
                let text = unescape_operators(&apply_padding(&text)?);
                field.field_type.coerce(&text, origin, &field.name)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ConcreteRow::new(origin, values))
    }
}

/// Replaces `\N` with entry `N` of the group table; unknown indices stay literal.
pub fn substitute_back_references(text: &str, groups: &[&str]) -> String {
    BACK_REFERENCE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| groups.get(i))
                .map_or_else(|| caps[0].to_string(), |g| g.to_string())
        })
        .into_owned()
}
