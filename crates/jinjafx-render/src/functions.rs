//! The `jinjafx` template object.
//!
//! Every template sees one global `jinjafx` whose attributes describe the
//! current row and whose methods reach back into the run:
//!
//! | Member | Returns |
//! |--------|---------|
//! | `row`, `rows`, `version` | current 1-based row (0 without data), row count, crate version |
//! | `expand(pattern)` | list of expanded strings |
//! | `counter(key=None, increment=1, start=1)` | next counter value |
//! | `data(row, col=None)` | a cell, or a whole row; row 0 is the header |
//! | `first(fields=None, filter={})`, `last(...)` | whether this row opens/closes its group |
//! | `fields(field, filter={})` | ordered unique values of a field |
//! | `setg(key, value)`, `getg(key, default=None)` | run-scoped globals |
//! | `warning(msg, repeat=False)` | `""`; records a warning |
//! | `exception(msg)` | aborts the run |
//! | `now(format=None, tz="UTC")` | current time |
//! | `lookup("vars", name, default=None)` | a variable by name |
//! | `tabulate(datarows=None, cols=None, style="default")` | aligned text table |
//!
//! All state lives in a [`RunContext`] built fresh for each run.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use jinjafx_data::{Expander, RowStore};
use minijinja::value::{from_args, Enumerator, Kwargs, Object, ValueKind};
use minijinja::{Error, ErrorKind, State, Value};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::FxError;
use crate::tabulate::{tabulate, TableStyle};
use crate::warnings::WarningLog;

static UTC_OFFSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+-])(\d{2}):?(\d{2})$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CounterSlot {
    Row(usize),
    Key(String),
}

#[derive(Debug, Default)]
struct Scratch {
    counters: HashMap<CounterSlot, i64>,
    globals: HashMap<String, Value>,
    warnings: WarningLog,
    abort: Option<FxError>,
}

/// Mutable state of one run, shared with the `jinjafx` template object.
#[derive(Debug)]
pub struct RunContext {
    store: RowStore,
    row: AtomicUsize,
    expander: Mutex<Expander>,
    scratch: Mutex<Scratch>,
}

impl RunContext {
    pub fn new(store: RowStore, expander: Expander) -> Self {
        RunContext {
            store,
            row: AtomicUsize::new(0),
            expander: Mutex::new(expander),
            scratch: Mutex::new(Scratch::default()),
        }
    }

    pub fn store(&self) -> &RowStore {
        &self.store
    }

    pub fn row(&self) -> usize {
        self.row.load(Ordering::SeqCst)
    }

    pub fn set_row(&self, row: usize) {
        self.row.store(row, Ordering::SeqCst);
    }

    fn scratch(&self) -> MutexGuard<'_, Scratch> {
        self.scratch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the error a template function stored before failing the render.
    pub fn take_abort(&self) -> Option<FxError> {
        self.scratch().abort.take()
    }

    /// Warnings recorded so far, in order.
    pub fn warnings(&self) -> Vec<String> {
        self.scratch().warnings.entries().to_vec()
    }

    /// Records `err` as the run's failure and returns an engine error that
    /// stops rendering.
    fn fail(&self, err: impl Into<FxError>) -> Error {
        let err = err.into();
        let message = err.to_string();
        self.scratch().abort.get_or_insert(err);
        Error::new(ErrorKind::InvalidOperation, message)
    }

    fn counter(&self, key: Option<String>, increment: i64, start: i64) -> i64 {
        let slot = match key {
            Some(key) => CounterSlot::Key(key),
            None => CounterSlot::Row(self.row()),
        };
        let mut scratch = self.scratch();
        let value = scratch
            .counters
            .get(&slot)
            .map_or(start, |n| n.saturating_add(increment));
        scratch.counters.insert(slot, value);
        value
    }

    fn data(&self, row: usize, col: Option<Value>) -> Result<Value, Error> {
        let names = self.store.names();
        if row == 0 {
            return match col {
                None => Ok(Value::from_serialize(&names)),
                Some(col) => Ok(Value::from(names[self.column(&col, names.len())?])),
            };
        }

        let Some(values) = self.store.row(row).map(|r| r.values()) else {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("data(): row {} out of range (1-{})", row, self.store.len()),
            ));
        };
        match col {
            None => Ok(Value::from_serialize(values)),
            Some(col) => Ok(Value::from_serialize(&values[self.column(&col, values.len())?])),
        }
    }

    fn column(&self, col: &Value, width: usize) -> Result<usize, Error> {
        let index = match col.as_str() {
            Some(field) => self.store.column(field).map_err(|e| self.fail(e))?,
            None => usize::try_from(col.clone()).map_err(|_| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("data(): column must be a field name or index, not '{}'", col),
                )
            })?,
        };
        if index >= width {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("data(): column {} out of range", index),
            ));
        }
        Ok(index)
    }

    fn boundary(&self, last: bool, fields: Option<Value>, filter: Option<Value>) -> Result<bool, Error> {
        let fields = fields
            .filter(|v| !v.is_none() && !v.is_undefined())
            .map(|v| string_list(&v))
            .transpose()?;
        let filter = self
            .store
            .filter(&string_map(filter.as_ref())?)
            .map_err(|e| self.fail(e))?;

        let row = self.row();
        let result = if last {
            self.store.is_last(row, fields.as_deref(), &filter)
        } else {
            self.store.is_first(row, fields.as_deref(), &filter)
        };
        result.map_err(|e| self.fail(e))
    }

    fn fields(&self, field: &str, filter: Option<Value>) -> Result<Value, Error> {
        let filter = self
            .store
            .filter(&string_map(filter.as_ref())?)
            .map_err(|e| self.fail(e))?;
        let values = self.store.unique(field, &filter).map_err(|e| self.fail(e))?;
        Ok(Value::from_serialize(&values))
    }

    fn tabulate(&self, datarows: Option<Value>, cols: Option<Value>, style: TableStyle) -> Result<String, Error> {
        let (header, rows) = match datarows.filter(|v| !v.is_none() && !v.is_undefined()) {
            Some(datarows) => {
                let mut table = datarows
                    .try_iter()?
                    .map(|row| string_list(&row))
                    .collect::<Result<Vec<_>, _>>()?;
                if table.is_empty() {
                    return Ok(String::new());
                }
                let header = table.remove(0);
                (header, table)
            }
            None => {
                if self.store.is_empty() {
                    return Ok(String::new());
                }
                let header = self.store.names().into_iter().map(str::to_string).collect();
                let rows = self
                    .store
                    .rows()
                    .iter()
                    .map(|row| row.values().iter().map(|v| v.to_string()).collect())
                    .collect();
                (header, rows)
            }
        };

        let Some(cols) = cols.filter(|v| !v.is_none() && !v.is_undefined()) else {
            return Ok(tabulate(&header, &rows, style));
        };

        let indices = string_list(&cols)?
            .iter()
            .map(|col| {
                header.iter().position(|h| h == col).ok_or_else(|| {
                    Error::new(
                        ErrorKind::InvalidOperation,
                        format!("tabulate(): unknown column '{}'", col),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let pick = |row: &[String]| -> Vec<String> {
            indices
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect()
        };
        let rows: Vec<Vec<String>> = rows.iter().map(|r| pick(r)).collect();
        Ok(tabulate(&pick(&header), &rows, style))
    }
}

/// The `jinjafx` global.
#[derive(Debug)]
pub struct JinjaFxObject {
    context: Arc<RunContext>,
}

impl JinjaFxObject {
    pub fn new(context: Arc<RunContext>) -> Self {
        JinjaFxObject { context }
    }
}

impl Object for JinjaFxObject {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match key.as_str()? {
            "row" => Some(Value::from(self.context.row())),
            "rows" => Some(Value::from(self.context.store.len())),
            "version" => Some(Value::from(env!("CARGO_PKG_VERSION"))),
            _ => None,
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(&["row", "rows", "version"])
    }

    fn call_method(self: &Arc<Self>, state: &State, name: &str, args: &[Value]) -> Result<Value, Error> {
        let ctx = &self.context;
        match name {
            "expand" => {
                let (pattern,): (String,) = from_args(args)?;
                let mut expander = ctx.expander.lock().unwrap_or_else(PoisonError::into_inner);
                let values = expander.expand_values(&pattern).map_err(|e| ctx.fail(e))?;
                Ok(Value::from_serialize(&values))
            }
            "counter" => {
                let (key, increment, start, kwargs): (Option<Value>, Option<i64>, Option<i64>, Kwargs) =
                    from_args(args)?;
                let key = match key {
                    Some(key) => Some(key),
                    None => kwargs.get::<Option<Value>>("key")?,
                }
                .filter(|k| !k.is_none() && !k.is_undefined())
                .map(|k| k.to_string());
                let increment = match increment {
                    Some(n) => n,
                    None => kwargs.get::<Option<i64>>("increment")?.unwrap_or(1),
                };
                let start = match start {
                    Some(n) => n,
                    None => kwargs.get::<Option<i64>>("start")?.unwrap_or(1),
                };
                kwargs.assert_all_used()?;
                Ok(Value::from(ctx.counter(key, increment, start)))
            }
            "data" => {
                let (row, col): (usize, Option<Value>) = from_args(args)?;
                ctx.data(row, col)
            }
            "first" | "last" => {
                let (fields, filter, kwargs): (Option<Value>, Option<Value>, Kwargs) = from_args(args)?;
                let fields = match fields {
                    Some(fields) => Some(fields),
                    None => kwargs.get::<Option<Value>>("fields")?,
                };
                let filter = match filter {
                    Some(filter) => Some(filter),
                    None => kwargs.get::<Option<Value>>("filter")?,
                };
                kwargs.assert_all_used()?;
                Ok(Value::from(ctx.boundary(name == "last", fields, filter)?))
            }
            "fields" => {
                let (field, filter, kwargs): (String, Option<Value>, Kwargs) = from_args(args)?;
                let filter = match filter {
                    Some(filter) => Some(filter),
                    None => kwargs.get::<Option<Value>>("filter")?,
                };
                kwargs.assert_all_used()?;
                ctx.fields(&field, filter)
            }
            "setg" => {
                let (key, value): (String, Value) = from_args(args)?;
                ctx.scratch().globals.insert(key, value);
                Ok(Value::from(""))
            }
            "getg" => {
                let (key, default): (String, Option<Value>) = from_args(args)?;
                let value = ctx.scratch().globals.get(&key).cloned();
                Ok(value.or(default).unwrap_or(Value::from(())))
            }
            "warning" => {
                let (message, repeat, kwargs): (String, Option<bool>, Kwargs) = from_args(args)?;
                let repeat = match repeat {
                    Some(repeat) => repeat,
                    None => kwargs.get::<Option<bool>>("repeat")?.unwrap_or(false),
                };
                kwargs.assert_all_used()?;
                ctx.scratch().warnings.record(message, repeat);
                Ok(Value::from(""))
            }
            "exception" => {
                let (message,): (String,) = from_args(args)?;
                Err(ctx.fail(FxError::Raised(message)))
            }
            "now" => {
                let (format, tz, kwargs): (Option<String>, Option<String>, Kwargs) = from_args(args)?;
                let format = match format {
                    Some(format) => Some(format),
                    None => kwargs.get::<Option<String>>("format")?,
                };
                let tz = match tz {
                    Some(tz) => tz,
                    None => kwargs
                        .get::<Option<String>>("tz")?
                        .unwrap_or_else(|| "UTC".to_string()),
                };
                kwargs.assert_all_used()?;
                now(format.as_deref(), &tz).map(Value::from)
            }
            "lookup" => {
                let (method, variable, default): (String, String, Option<Value>) = from_args(args)?;
                if method != "vars" && method != "ansible.builtin.vars" {
                    return Err(Error::new(
                        ErrorKind::InvalidOperation,
                        format!("lookup(): unsupported method '{}'", method),
                    ));
                }
                match state.lookup(&variable).filter(|v| !v.is_undefined()).or(default) {
                    Some(value) => Ok(value),
                    None => Err(Error::new(
                        ErrorKind::UndefinedError,
                        format!("lookup(): variable '{}' is undefined", variable),
                    )),
                }
            }
            "tabulate" => {
                let (datarows, cols, style, kwargs): (Option<Value>, Option<Value>, Option<String>, Kwargs) =
                    from_args(args)?;
                let datarows = match datarows {
                    Some(datarows) => Some(datarows),
                    None => kwargs.get::<Option<Value>>("datarows")?,
                };
                let cols = match cols {
                    Some(cols) => Some(cols),
                    None => kwargs.get::<Option<Value>>("cols")?,
                };
                let style = match style {
                    Some(style) => style,
                    None => kwargs
                        .get::<Option<String>>("style")?
                        .unwrap_or_else(|| "default".to_string()),
                };
                kwargs.assert_all_used()?;
                let style = TableStyle::parse(&style).ok_or_else(|| {
                    Error::new(
                        ErrorKind::InvalidOperation,
                        format!("tabulate(): unknown style '{}'", style),
                    )
                })?;
                ctx.tabulate(datarows, cols, style).map(Value::from)
            }
            _ => Err(Error::new(
                ErrorKind::UnknownMethod,
                format!("jinjafx has no method '{}'", name),
            )),
        }
    }
}

/// A string, or a sequence of values as strings.
fn string_list(value: &Value) -> Result<Vec<String>, Error> {
    if let Some(s) = value.as_str() {
        return Ok(vec![s.to_string()]);
    }
    Ok(value.try_iter()?.map(|v| v.to_string()).collect())
}

fn string_map(value: Option<&Value>) -> Result<BTreeMap<String, String>, Error> {
    let Some(value) = value.filter(|v| !v.is_none() && !v.is_undefined()) else {
        return Ok(BTreeMap::new());
    };
    if value.kind() != ValueKind::Map {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("filter must be a mapping of field to regex, not '{}'", value),
        ));
    }
    value
        .try_iter()?
        .map(|key| {
            let pattern = value.get_item(&key)?;
            Ok((key.to_string(), pattern.to_string()))
        })
        .collect()
}

fn now(format: Option<&str>, tz: &str) -> Result<String, Error> {
    match tz {
        "UTC" | "utc" => format_time(Utc::now(), format),
        "local" => format_time(Local::now(), format),
        offset => {
            let offset = parse_offset(offset).ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("now(): unknown timezone '{}'", offset),
                )
            })?;
            format_time(Utc::now().with_timezone(&offset), format)
        }
    }
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    let caps = UTC_OFFSET.captures(text)?;
    let hours: i32 = caps[2].parse().ok()?;
    let minutes: i32 = caps[3].parse().ok()?;
    let seconds = hours * 3600 + minutes * 60;
    let seconds = if &caps[1] == "-" { -seconds } else { seconds };
    FixedOffset::east_opt(seconds)
}

fn format_time<Tz: TimeZone>(time: DateTime<Tz>, format: Option<&str>) -> Result<String, Error>
where
    Tz::Offset: fmt::Display,
{
    let Some(format) = format else {
        return Ok(time.to_rfc3339());
    };
    let mut out = String::new();
    write!(out, "{}", time.format(format)).map_err(|_| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("now(): invalid format '{}'", format),
        )
    })?;
    Ok(out)
}
