//! JinjaFx data - turns compact tabular data into concrete rows.
//!
//! The data half of JinjaFx reads a header plus data lines where a single
//! line can describe many rows:
//!
//! ```text
//! host, peer, vlan:int, ip
//! spine(1|2), leaf\0, {100-101:1}, 10.0.0.{1:1}
//! ```
//!
//! multiplies into four rows, correlating `peer` with the `host` alternation
//! through the back-reference `\0` and numbering `ip` per input line.
//!
//! # Pipeline
//!
//! ```text
//! text ─► HeaderSchema ─► RowMultiplier ─► RowFilter ─► RowSorter ─► RowStore
//!               (expand, back-refs, counters, padding, coercion)
//! ```
//!
//! - [`HeaderSchema`]: field names, `:int`/`:float` annotations, `[list]` fields
//!   and the delimiter (comma or tab) detected from the header line.
//! - [`Expander`]: alternation `(a|b)`, character classes `[A-C]` and numeric
//!   ranges `{1-9:2}`, optionally under a shared variant budget.
//! - [`CounterRegistry`]: counters `{start:step}` and data loops `{a|b|c}`
//!   keyed by origin line, column and operator text.
//! - [`RowFilter`] / [`RowSorter`]: per-column regex inclusion and multi-key
//!   ordering.
//! - [`RowStore`]: the final ordered rows plus the queries templates ask
//!   (`first`, `last`, unique field values).
//!
//! # Quick Start
//!
//! ```rust
//! use jinjafx_data::{Expander, LoadOptions, RowStore};
//!
//! let data = "host, port\nsw(1|2), eth[0-1]\n";
//! let store = RowStore::load(data, &LoadOptions::default(), &mut Expander::unbounded()).unwrap();
//!
//! let hosts: Vec<String> = store
//!     .rows()
//!     .iter()
//!     .map(|row| format!("{}:{}", row.values()[0], row.values()[1]))
//!     .collect();
//! assert_eq!(hosts, vec!["sw1:eth0", "sw1:eth1", "sw2:eth0", "sw2:eth1"]);
//! ```

mod counter;
mod error;
mod expand;
mod filter;
mod header;
mod multiply;
mod sort;
mod store;
mod value;

pub use counter::{apply_padding, unescape_operators, CounterKey, CounterRegistry};
pub use error::{DataError, Result};
pub use expand::{expand, Expander, Expansion};
pub use filter::RowFilter;
pub use header::{strip_quotes, Delimiter, HeaderField, HeaderSchema};
pub use multiply::{substitute_back_references, ConcreteRow, RowMultiplier};
pub use sort::{Dir, RowSorter};
pub use store::{LoadOptions, RowStore};
pub use value::{CellValue, FieldKind, FieldType};
