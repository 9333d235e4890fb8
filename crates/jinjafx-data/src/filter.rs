//! Row inclusion filters.
//!
//! A [`RowFilter`] is a set of per-column regex predicates. A row passes when
//! every predicate matches: scalar columns must match directly, list columns
//! need at least one matching element.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::{DataError, Result};
use crate::header::HeaderSchema;
use crate::multiply::ConcreteRow;

#[derive(Debug, Clone)]
struct Predicate {
    column: usize,
    regex: Regex,
}

impl Predicate {
    fn matches(&self, row: &ConcreteRow) -> bool {
        row.get(self.column).is_some_and(|value| {
            value
                .items()
                .iter()
                .any(|item| self.regex.is_match(&item.to_string()))
        })
    }
}

/// Compiled per-column inclusion predicates.
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    predicates: Vec<Predicate>,
}

impl RowFilter {
    /// A filter that accepts every row.
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// Compiles `field -> regex` predicates against a schema.
    ///
    /// Naming a field the header doesn't declare is an error.
    pub fn new(schema: &HeaderSchema, predicates: &BTreeMap<String, String>) -> Result<Self> {
        let predicates = predicates
            .iter()
            .map(|(field, pattern)| {
                let column = schema
                    .index_of(field)
                    .ok_or_else(|| DataError::UnknownFilterField(field.clone()))?;
                let regex = Regex::new(pattern).map_err(|source| DataError::InvalidFilterRegex {
                    field: field.clone(),
                    pattern: pattern.clone(),
                    source,
                })?;
                Ok(Predicate { column, regex })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RowFilter { predicates })
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, row: &ConcreteRow) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }
}
