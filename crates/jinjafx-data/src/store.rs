//! The ordered collection of concrete rows for one run.
//!
//! [`RowStore::load`] drives the whole data pipeline: it skips blank and
//! `#` comment lines, parses the header, multiplies every data line, applies
//! the row filter and finally the sort order. The store then answers the
//! row queries templates make (`data`, `first`, `last`, `fields`).

use std::collections::BTreeMap;

use log::debug;
use serde::Deserialize;

use crate::error::{DataError, Result};
use crate::expand::Expander;
use crate::filter::RowFilter;
use crate::header::HeaderSchema;
use crate::multiply::{ConcreteRow, RowMultiplier};
use crate::sort::RowSorter;
use crate::value::CellValue;

/// Options applied while loading rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Column name to inclusion regex.
    pub filter: BTreeMap<String, String>,
    /// Sort keys, e.g. `["site", "-vlan"]`.
    pub sort: Vec<String>,
}

/// Header plus concrete rows, in final order.
#[derive(Debug, Clone, Default)]
pub struct RowStore {
    schema: Option<HeaderSchema>,
    rows: Vec<ConcreteRow>,
}

impl RowStore {
    /// A store for runs without data: no header and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses, multiplies, filters and sorts `data`.
    ///
    /// Data that is blank (or only comments) gives an empty store. A header
    /// without any surviving rows is [`DataError::NoData`].
    pub fn load(data: &str, options: &LoadOptions, expander: &mut Expander) -> Result<Self> {
        let mut lines = data.lines().filter(|line| {
            let content = line.trim();
            !content.is_empty() && !content.starts_with('#')
        });

        let Some(header) = lines.next() else {
            return Ok(Self::empty());
        };

        let schema = HeaderSchema::parse(header)?;
        let filter = RowFilter::new(&schema, &options.filter)?;
        let sorter = RowSorter::new(&schema, &options.sort)?;

        let mut rows = Vec::new();
        let mut multiplier = RowMultiplier::new(&schema);
        for line in lines {
            rows.extend(
                multiplier
                    .multiply(line, expander)?
                    .into_iter()
                    .filter(|row| filter.matches(row)),
            );
        }

        if rows.is_empty() {
            return Err(DataError::NoData);
        }
        sorter.sort(&mut rows);

        debug!(
            "loaded {} rows across {} columns ({} counter sites)",
            rows.len(),
            schema.len(),
            multiplier.counters().len()
        );

        Ok(RowStore {
            schema: Some(schema),
            rows,
        })
    }

    pub fn schema(&self) -> Option<&HeaderSchema> {
        self.schema.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ConcreteRow] {
        &self.rows
    }

    /// Header field names, empty when there is no data.
    pub fn names(&self) -> Vec<&str> {
        self.schema.iter().flat_map(|s| s.names()).collect()
    }

    /// Returns a row by 1-based number.
    pub fn row(&self, number: usize) -> Option<&ConcreteRow> {
        number.checked_sub(1).and_then(|i| self.rows.get(i))
    }

    /// Column index of a field name.
    pub fn column(&self, field: &str) -> Result<usize> {
        self.schema
            .as_ref()
            .and_then(|s| s.index_of(field))
            .ok_or_else(|| DataError::UnknownField(field.to_string()))
    }

    /// Field name to JSON value for the given 1-based row.
    pub fn bindings(&self, number: usize) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        if let Some(row) = self.row(number) {
            for (name, value) in self.names().into_iter().zip(row.values()) {
                map.insert(name.to_string(), value.to_json());
            }
        }
        map
    }

    /// Compiles a filter against this store's header.
    pub fn filter(&self, predicates: &BTreeMap<String, String>) -> Result<RowFilter> {
        match &self.schema {
            Some(schema) => RowFilter::new(schema, predicates),
            None => match predicates.keys().next() {
                Some(field) => Err(DataError::UnknownFilterField(field.clone())),
                None => Ok(RowFilter::accept_all()),
            },
        }
    }

    /// Whether `current` is the first row carrying its values of `fields`
    /// among the rows accepted by `filter`.
    ///
    /// Without `fields`, whether `current` is row 1. Row 0 (no data) is
    /// always first.
    pub fn is_first(&self, current: usize, fields: Option<&[String]>, filter: &RowFilter) -> Result<bool> {
        self.is_boundary(current, fields, filter, false)
    }

    /// Mirror of [`RowStore::is_first`] from the end of the rows.
    pub fn is_last(&self, current: usize, fields: Option<&[String]>, filter: &RowFilter) -> Result<bool> {
        self.is_boundary(current, fields, filter, true)
    }

    fn is_boundary(
        &self,
        current: usize,
        fields: Option<&[String]>,
        filter: &RowFilter,
        from_end: bool,
    ) -> Result<bool> {
        if current == 0 || self.rows.is_empty() {
            return Ok(true);
        }

        let Some(fields) = fields else {
            let boundary = if from_end { self.rows.len() } else { 1 };
            return Ok(current == boundary);
        };

        let columns = fields
            .iter()
            .map(|f| self.column(f))
            .collect::<Result<Vec<_>>>()?;
        let Some(row) = self.row(current) else {
            return Ok(false);
        };
        let target = group_key(row, &columns);

        let numbers: Box<dyn Iterator<Item = usize>> = if from_end {
            Box::new((1..=self.rows.len()).rev())
        } else {
            Box::new(1..=self.rows.len())
        };

        for number in numbers {
            let candidate = &self.rows[number - 1];
            if filter.matches(candidate) && group_key(candidate, &columns) == target {
                return Ok(number == current);
            }
        }
        Ok(false)
    }

    /// Distinct values of a field, in row order, among rows accepted by `filter`.
    pub fn unique(&self, field: &str, filter: &RowFilter) -> Result<Vec<CellValue>> {
        let column = self.column(field)?;
        let mut values: Vec<CellValue> = Vec::new();
        for row in self.rows.iter().filter(|r| filter.matches(r)) {
            if let Some(value) = row.get(column) {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
        Ok(values)
    }
}

/// Values of `columns` in `row`, the identity of a first/last group.
fn group_key<'r>(row: &'r ConcreteRow, columns: &[usize]) -> Vec<Option<&'r CellValue>> {
    columns.iter().map(|&c| row.get(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = "\
# devices
site, host, vlan:int

lon, sw(1|2), 10
par, sw1, 20
lon, sw3, 30
";

    fn load(data: &str) -> RowStore {
        RowStore::load(data, &LoadOptions::default(), &mut Expander::unbounded()).unwrap()
    }

    fn strings(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn loads_and_skips_comments() {
        let store = load(DATA);
        assert_eq!(store.names(), vec!["site", "host", "vlan"]);
        assert_eq!(store.len(), 4);
        assert_eq!(store.row(2).unwrap().values()[1], CellValue::Str("sw2".into()));
        assert!(store.row(0).is_none());
        assert!(store.row(5).is_none());
    }

    #[test]
    fn blank_data_is_empty() {
        let store = load("  \n# only a comment\n");
        assert!(store.is_empty());
        assert!(store.schema().is_none());
    }

    #[test]
    fn tab_rows_keep_a_leading_empty_cell() {
        let store = load("a\tb\n\tx\n  # indented comment\n");
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.row(1).unwrap().values(),
            &[CellValue::Str(String::new()), CellValue::Str("x".into())]
        );
    }

    #[test]
    fn header_only_is_no_data() {
        let err = RowStore::load("a, b\n", &LoadOptions::default(), &mut Expander::unbounded());
        assert!(matches!(err, Err(DataError::NoData)));
    }

    #[test]
    fn filter_and_sort_are_applied() {
        let options = LoadOptions {
            filter: [("site".to_string(), "^lon$".to_string())].into(),
            sort: vec!["-vlan".into()],
        };
        let store = RowStore::load(DATA, &options, &mut Expander::unbounded()).unwrap();
        let hosts: Vec<_> = store.rows().iter().map(|r| r.values()[1].to_string()).collect();
        assert_eq!(hosts, vec!["sw3", "sw1", "sw2"]);
    }

    #[test]
    fn filter_on_undeclared_field_fails_the_load() {
        let options = LoadOptions {
            filter: [("rack".to_string(), ".".to_string())].into(),
            sort: vec![],
        };
        assert!(matches!(
            RowStore::load(DATA, &options, &mut Expander::unbounded()),
            Err(DataError::UnknownFilterField(_))
        ));
    }

    #[test]
    fn bindings_are_typed() {
        let store = load(DATA);
        let bindings = store.bindings(1);
        assert_eq!(bindings["site"], serde_json::json!("lon"));
        assert_eq!(bindings["vlan"], serde_json::json!(10));
    }

    #[test]
    fn first_and_last_without_fields() {
        let store = load(DATA);
        let all = RowFilter::accept_all();
        assert!(store.is_first(1, None, &all).unwrap());
        assert!(!store.is_first(2, None, &all).unwrap());
        assert!(store.is_last(4, None, &all).unwrap());
        assert!(store.is_first(0, None, &all).unwrap());
    }

    #[test]
    fn first_and_last_by_field() {
        let store = load(DATA);
        let all = RowFilter::accept_all();
        let site = strings(&["site"]);
        let firsts: Vec<bool> = (1..=4).map(|r| store.is_first(r, Some(&site), &all).unwrap()).collect();
        let lasts: Vec<bool> = (1..=4).map(|r| store.is_last(r, Some(&site), &all).unwrap()).collect();
        assert_eq!(firsts, vec![true, false, true, false]);
        assert_eq!(lasts, vec![false, false, true, true]);
    }

    #[test]
    fn first_with_unknown_field_fails() {
        let store = load(DATA);
        let err = store.is_first(1, Some(&strings(&["rack"])), &RowFilter::accept_all());
        assert!(matches!(err, Err(DataError::UnknownField(_))));
    }

    #[test]
    fn unique_values() {
        let store = load(DATA);
        let sites = store.unique("site", &RowFilter::accept_all()).unwrap();
        assert_eq!(
            sites,
            vec![CellValue::Str("lon".into()), CellValue::Str("par".into())]
        );

        let filter = store
            .filter(&[("site".to_string(), "lon".to_string())].into())
            .unwrap();
        assert_eq!(store.unique("vlan", &filter).unwrap().len(), 2);
    }
}
