//! Typed cell values.
//!
//! Header annotations (`name:int`, `[name:float]`, ...) declare how a resolved
//! cell string is coerced before it is bound to a template. [`CellValue`] is
//! the coerced result.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::error::{DataError, Result};

/// Scalar type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldKind {
    #[default]
    Str,
    Int,
    Float,
}

impl FieldKind {
    /// Returns the annotation name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Str => "str",
            FieldKind::Int => "int",
            FieldKind::Float => "float",
        }
    }

    /// Parses a header type annotation.
    pub fn from_annotation(s: &str) -> Option<Self> {
        match s {
            "str" => Some(FieldKind::Str),
            "int" => Some(FieldKind::Int),
            "float" => Some(FieldKind::Float),
            _ => None,
        }
    }

    fn coerce(self, text: &str) -> Option<CellValue> {
        match self {
            FieldKind::Str => Some(CellValue::Str(text.to_string())),
            FieldKind::Int => text.trim().parse().ok().map(CellValue::Int),
            FieldKind::Float => text.trim().parse().ok().map(CellValue::Float),
        }
    }
}

/// Declared type of a column: a scalar kind, optionally as a `;`-separated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldType {
    pub kind: FieldKind,
    pub list: bool,
}

impl FieldType {
    pub fn scalar(kind: FieldKind) -> Self {
        FieldType { kind, list: false }
    }

    pub fn list(kind: FieldKind) -> Self {
        FieldType { kind, list: true }
    }

    /// Coerces a fully resolved cell string into a typed value.
    ///
    /// `row` and `field` are only used to build the error.
    pub fn coerce(&self, text: &str, row: usize, field: &str) -> Result<CellValue> {
        let invalid = |value: &str| DataError::InvalidValue {
            row,
            field: field.to_string(),
            kind: self.kind.as_str(),
            value: value.to_string(),
        };

        if !self.list {
            return self.kind.coerce(text).ok_or_else(|| invalid(text));
        }

        if text.trim().is_empty() {
            return Ok(CellValue::List(Vec::new()));
        }

        text.split(';')
            .map(str::trim)
            .map(|item| self.kind.coerce(item).ok_or_else(|| invalid(item)))
            .collect::<Result<Vec<_>>>()
            .map(CellValue::List)
    }
}

/// A typed value bound to one column of a concrete row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Str(String),
    Int(i64),
    Float(f64),
    List(Vec<CellValue>),
}

impl CellValue {
    /// Returns the list elements, or a one-element slice for scalars.
    pub fn items(&self) -> &[CellValue] {
        match self {
            CellValue::List(items) => items,
            scalar => std::slice::from_ref(scalar),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Int(_) | CellValue::Float(_))
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(n) => Some(*n as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Converts to a JSON value for binding snapshots.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Str(s) => serde_json::Value::String(s.clone()),
            CellValue::Int(n) => serde_json::Value::from(*n),
            CellValue::Float(x) => serde_json::Number::from_f64(*x)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            CellValue::List(items) => {
                serde_json::Value::Array(items.iter().map(CellValue::to_json).collect())
            }
        }
    }

    /// Orders two values: numerically when both are numbers, textually otherwise.
    pub fn compare(&self, other: &CellValue) -> Ordering {
        match (self, other) {
            (CellValue::Int(a), CellValue::Int(b)) => a.cmp(b),
            (CellValue::List(a), CellValue::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => self.to_string().cmp(&other.to_string()),
            },
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Str(s) => f.write_str(s),
            CellValue::Int(n) => write!(f, "{}", n),
            CellValue::Float(x) => write!(f, "{}", x),
            CellValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}
