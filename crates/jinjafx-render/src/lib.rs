//! JinjaFx render - per-row templating with output routing.
//!
//! A [`JinjaFx`] runner takes a template, loads tabular data through
//! [`jinjafx_data`], renders the template once per concrete row and splits
//! the rendered text into named outputs:
//!
//! ```text
//! data ─► RowStore ─► for each row: template ─► OutputRouter ─► Outputs
//!                                  ▲
//!                       jinjafx object (counters, first/last, ...)
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use jinjafx_render::{JinjaFx, Vars};
//!
//! let template = "\
//! <output \"{{ host }}\">
//! hostname {{ host }}
//! interface vlan{{ vlan }}
//! </output>
//! ";
//! let data = "host, vlan:int\nspine(1|2), {10-20:10}\n";
//!
//! let run = JinjaFx::new(template).run(Some(data), &Vars::new()).unwrap();
//! assert_eq!(
//!     run.outputs.text("spine1").unwrap(),
//!     "hostname spine1\ninterface vlan10\nhostname spine1\ninterface vlan20\n"
//! );
//! ```
//!
//! # Output tags
//!
//! | Tag | Effect |
//! |-----|--------|
//! | `<output "name">` | route following lines to `name` |
//! | `<output:json 'name'>[3]` | explicit format and ordering index |
//! | `</output>` | back to the enclosing destination |
//! | `</output\n>` | same, then one empty line |
//!
//! Destinations collect lines from every row and are ordered by index, so a
//! `[0]` header emitted by the last row still comes first. Without tags all
//! text goes to the destination named by [`RunOptions::output`]
//! (`_stdout_` by default).

mod engine;
mod error;
mod functions;
mod options;
mod router;
mod run;
mod tabulate;
mod warnings;

pub use engine::{MiniJinjaEngine, TemplateEngine};
pub use error::{FxError, Result};
pub use functions::{JinjaFxObject, RunContext};
pub use options::{RunOptions, Vars, DEFAULT_OUTPUT};
pub use router::{tokenize, Destination, Output, OutputRouter, Outputs, Token, DEFAULT_FORMAT};
pub use run::{JinjaFx, RunOutput};
pub use tabulate::{tabulate, TableStyle};
pub use warnings::WarningLog;

pub use jinjafx_data;
