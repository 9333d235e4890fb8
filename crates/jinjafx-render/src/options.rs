//! Run configuration and global template variables.

use std::collections::BTreeMap;

use jinjafx_data::LoadOptions;
use serde::Deserialize;

use crate::error::{FxError, Result};

/// Name of the default output destination.
pub const DEFAULT_OUTPUT: &str = "_stdout_";

const FILTER_KEY: &str = "jinjafx_filter";
const SORT_KEY: &str = "jinjafx_sort";

/// Options for one [`JinjaFx`](crate::JinjaFx) runner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Template for the default destination name, rendered per row.
    pub output: String,
    /// Expansion budget; `Some` turns on sandboxed mode.
    pub budget: Option<usize>,
    /// Column name to inclusion regex.
    pub filter: BTreeMap<String, String>,
    /// Sort keys such as `"site"` or `"-vlan"`.
    pub sort: Vec<String>,
    pub trim_blocks: bool,
    pub lstrip_blocks: bool,
    pub keep_trailing_newline: bool,
    /// Fail on undefined template variables.
    pub strict_undefined: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            output: DEFAULT_OUTPUT.to_string(),
            budget: None,
            filter: BTreeMap::new(),
            sort: Vec::new(),
            trim_blocks: true,
            lstrip_blocks: true,
            keep_trailing_newline: true,
            strict_undefined: true,
        }
    }
}

impl RunOptions {
    /// Data loading options, taking `jinjafx_filter` / `jinjafx_sort` from
    /// `vars` when these options leave them empty.
    pub fn load_options(&self, vars: &Vars) -> Result<LoadOptions> {
        let filter = if self.filter.is_empty() {
            vars.filter()?
        } else {
            self.filter.clone()
        };
        let sort = if self.sort.is_empty() {
            vars.sort()?
        } else {
            self.sort.clone()
        };
        Ok(LoadOptions { filter, sort })
    }
}

/// Global variables visible to every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vars(serde_json::Map<String, serde_json::Value>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a YAML mapping. An empty document gives empty vars.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: serde_json::Value = serde_yaml::from_str(text)?;
        Self::from_value(value)
    }

    /// Parses a JSON object.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(Vars(map)),
            serde_json::Value::Null => Ok(Self::new()),
            other => Err(FxError::Vars(format!(
                "expected a mapping of variables, found {}",
                kind_name(&other)
            ))),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }

    fn filter(&self) -> Result<BTreeMap<String, String>> {
        match self.0.get(FILTER_KEY) {
            None | Some(serde_json::Value::Null) => Ok(BTreeMap::new()),
            Some(serde_json::Value::Object(map)) => Ok(map
                .iter()
                .map(|(field, pattern)| {
                    let pattern = match pattern {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (field.clone(), pattern)
                })
                .collect()),
            Some(other) => Err(FxError::Vars(format!(
                "'{}' must be a mapping, found {}",
                FILTER_KEY,
                kind_name(other)
            ))),
        }
    }

    fn sort(&self) -> Result<Vec<String>> {
        match self.0.get(SORT_KEY) {
            None | Some(serde_json::Value::Null) => Ok(Vec::new()),
            Some(serde_json::Value::String(key)) => Ok(vec![key.clone()]),
            Some(serde_json::Value::Array(keys)) => keys
                .iter()
                .map(|key| {
                    key.as_str().map(str::to_string).ok_or_else(|| {
                        FxError::Vars(format!("'{}' entries must be strings", SORT_KEY))
                    })
                })
                .collect(),
            Some(other) => Err(FxError::Vars(format!(
                "'{}' must be a list, found {}",
                SORT_KEY,
                kind_name(other)
            ))),
        }
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Vars {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Vars(map)
    }
}

fn kind_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = RunOptions::default();
        assert_eq!(options.output, "_stdout_");
        assert!(options.budget.is_none());
        assert!(options.trim_blocks && options.lstrip_blocks && options.keep_trailing_newline);
        assert!(options.strict_undefined);
    }

    #[test]
    fn deserializes_partial_options() {
        let options: RunOptions =
            serde_json::from_str(r#"{"budget": 100, "sort": ["-vlan"]}"#).unwrap();
        assert_eq!(options.budget, Some(100));
        assert_eq!(options.sort, vec!["-vlan"]);
        assert_eq!(options.output, DEFAULT_OUTPUT);
    }

    #[test]
    fn vars_from_yaml() {
        let vars = Vars::from_yaml("site: lon\nvlans:\n  - 10\n  - 20\n").unwrap();
        assert_eq!(vars.get("site"), Some(&serde_json::json!("lon")));
        assert_eq!(vars.get("vlans"), Some(&serde_json::json!([10, 20])));
        assert_eq!(Vars::from_yaml("").unwrap(), Vars::new());
    }

    #[test]
    fn vars_must_be_a_mapping() {
        assert!(matches!(Vars::from_json("[1, 2]"), Err(FxError::Vars(_))));
        assert!(matches!(Vars::from_yaml("a: [1"), Err(FxError::Vars(_))));
    }

    #[test]
    fn filter_and_sort_come_from_vars_when_unset() {
        let vars = Vars::from_yaml("jinjafx_filter:\n  site: '^lon'\njinjafx_sort: ['-vlan']\n").unwrap();

        let load = RunOptions::default().load_options(&vars).unwrap();
        assert_eq!(load.filter.get("site").map(String::as_str), Some("^lon"));
        assert_eq!(load.sort, vec!["-vlan"]);

        let explicit = RunOptions {
            sort: vec!["site".into()],
            ..RunOptions::default()
        };
        assert_eq!(explicit.load_options(&vars).unwrap().sort, vec!["site"]);
    }
}
