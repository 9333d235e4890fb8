//! Row ordering.
//!
//! Sort keys are field names, optionally prefixed with `+` (ascending, the
//! default) or `-` (descending). Numbers compare numerically, everything else
//! textually. Sorting is stable, so rows with equal keys keep their
//! multiplication order.

use std::cmp::Ordering;

use crate::error::{DataError, Result};
use crate::header::HeaderSchema;
use crate::multiply::ConcreteRow;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dir {
    #[default]
    Asc,
    Desc,
}

impl Dir {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Dir::Asc => ordering,
            Dir::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SortKey {
    column: usize,
    dir: Dir,
}

/// A compiled multi-key row ordering.
#[derive(Debug, Clone, Default)]
pub struct RowSorter {
    keys: Vec<SortKey>,
}

impl RowSorter {
    /// Compiles sort keys such as `["site", "-vlan"]` against a schema.
    pub fn new<S: AsRef<str>>(schema: &HeaderSchema, keys: &[S]) -> Result<Self> {
        let keys = keys
            .iter()
            .map(|key| {
                let key = key.as_ref().trim();
                let (field, dir) = if let Some(field) = key.strip_prefix('-') {
                    (field, Dir::Desc)
                } else {
                    (key.strip_prefix('+').unwrap_or(key), Dir::Asc)
                };
                let column = schema
                    .index_of(field)
                    .ok_or_else(|| DataError::UnknownSortField(field.to_string()))?;
                Ok(SortKey { column, dir })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RowSorter { keys })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn compare(&self, a: &ConcreteRow, b: &ConcreteRow) -> Ordering {
        for key in &self.keys {
            let ordering = match (a.get(key.column), b.get(key.column)) {
                (Some(x), Some(y)) => x.compare(y),
                _ => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return key.dir.apply(ordering);
            }
        }
        Ordering::Equal
    }

    pub fn sort(&self, rows: &mut [ConcreteRow]) {
        if !self.keys.is_empty() {
            rows.sort_by(|a, b| self.compare(a, b));
        }
    }
}
