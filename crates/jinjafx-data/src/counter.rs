//! Stateful counters and data loops.
//!
//! Two inline operators are resolved once per concrete row, after pattern
//! expansion and back-reference substitution:
//!
//! - counter `{start:increment[:repeat]}`: reads `start`, `start + increment`,
//!   ... with each value served `repeat + 1` times;
//! - data loop `{a|b|c[:repeat]}`: round-robins through the alternatives
//!   with the same repeat rule.
//!
//! State is keyed by [`CounterKey`] (origin row, column, operator text), so
//! the concrete rows multiplied out of one input line share a sequence while
//! other lines start fresh.

use std::collections::HashMap;

use log::trace;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{DataError, Result};
use crate::expand::is_escaped;

/// Widest zero padding `N%P` may ask for.
pub const MAX_PAD_WIDTH: usize = 255;

static COUNTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{[ \t]*(-?\d+)[ \t]*:[ \t]*(-?\d+)[ \t]*(?::[ \t]*(\d+)[ \t]*)?\}").unwrap()
});
static DATA_LOOP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]*?\|[^{}]*?)(?::[ \t]*(\d+)[ \t]*)?\}").unwrap());
static PADDING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)%(\d+)").unwrap());
static BRACE_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([{}%])").unwrap());

/// Identity of one counter or loop site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterKey {
    pub origin_row: usize,
    pub column: usize,
    pub pattern: String,
}

#[derive(Debug, Clone)]
struct Slot {
    position: i64,
    served: u64,
}

impl Slot {
    fn new(position: i64) -> Self {
        Slot {
            position,
            served: 0,
        }
    }

    /// Returns the current position, advancing first once it has been
    /// served `repeat + 1` times.
    fn next(&mut self, step: i64, repeat: u64) -> i64 {
        if self.served > repeat {
            self.position = self.position.saturating_add(step);
            self.served = 0;
        }
        self.served += 1;
        self.position
    }
}

/// Per-run state for counters and data loops.
#[derive(Debug, Default)]
pub struct CounterRegistry {
    slots: HashMap<CounterKey, Slot>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct counter and loop sites seen so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reads a counter: `start` on first use, then advancing by `increment`.
    pub fn counter(&mut self, key: CounterKey, start: i64, increment: i64, repeat: u64) -> i64 {
        self.slots
            .entry(key)
            .or_insert_with(|| Slot::new(start))
            .next(increment, repeat)
    }

    /// Reads a data loop, returning the index of the alternative to use.
    pub fn cycle(&mut self, key: CounterKey, len: usize, repeat: u64) -> usize {
        let position = self
            .slots
            .entry(key)
            .or_insert_with(|| Slot::new(0))
            .next(1, repeat);
        position.rem_euclid(len.max(1) as i64) as usize
    }

    /// Replaces every unescaped counter and data loop in `text`.
    ///
    /// Numbers that don't fit an `i64` (or a `u64` repeat) are pattern errors.
    pub fn substitute(&mut self, origin_row: usize, column: usize, text: &str) -> Result<String> {
        let text = replace_unescaped(&COUNTER, text, |caps| {
            let pattern = caps[0].to_string();
            let start = number(caps, 1, "counter start")?;
            let increment = number(caps, 2, "counter increment")?;
            let repeat = repeat(caps, 3)?;
            let key = CounterKey {
                origin_row,
                column,
                pattern,
            };
            let value = self.counter(key, start, increment, repeat);
            trace!("counter {} in row {} column {} -> {}", &caps[0], origin_row, column, value);
            Ok(value.to_string())
        })?;

        replace_unescaped(&DATA_LOOP, &text, |caps| {
            let alternatives: Vec<&str> = caps[1].split('|').collect();
            let repeat = repeat(caps, 2)?;
            let key = CounterKey {
                origin_row,
                column,
                pattern: caps[0].to_string(),
            };
            let index = self.cycle(key, alternatives.len(), repeat);
            Ok(alternatives[index].to_string())
        })
    }
}

fn invalid(caps: &Captures<'_>, reason: impl Into<String>) -> DataError {
    DataError::Pattern {
        pattern: caps[0].to_string(),
        reason: reason.into(),
    }
}

fn number(caps: &Captures<'_>, group: usize, what: &str) -> Result<i64> {
    caps[group]
        .parse()
        .map_err(|_| invalid(caps, format!("{} '{}' is out of range", what, &caps[group])))
}

fn repeat(caps: &Captures<'_>, group: usize) -> Result<u64> {
    caps.get(group).map_or(Ok(0), |m| {
        m.as_str()
            .parse()
            .map_err(|_| invalid(caps, format!("repeat '{}' is out of range", m.as_str())))
    })
}

/// Zero-pads every `N%P` run to width `P`, at most [`MAX_PAD_WIDTH`].
pub fn apply_padding(text: &str) -> Result<String> {
    replace_unescaped(&PADDING, text, |caps| {
        let width = caps[2]
            .parse::<usize>()
            .ok()
            .filter(|&w| w <= MAX_PAD_WIDTH)
            .ok_or_else(|| {
                invalid(caps, format!("padding width may not exceed {}", MAX_PAD_WIDTH))
            })?;
        Ok(format!("{:0>width$}", &caps[1], width = width))
    })
}

/// Removes the `\{`, `\}` and `\%` escapes that protected operators.
pub fn unescape_operators(text: &str) -> String {
    BRACE_ESCAPE.replace_all(text, "$1").into_owned()
}

fn replace_unescaped<F>(re: &Regex, text: &str, mut replace: F) -> Result<String>
where
    F: FnMut(&Captures<'_>) -> Result<String>,
{
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if is_escaped(bytes, whole.start()) {
            continue;
        }
        out.push_str(&text[last..whole.start()]);
        out.push_str(&replace(&caps)?);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(pattern: &str) -> CounterKey {
        CounterKey {
            origin_row: 1,
            column: 0,
            pattern: pattern.to_string(),
        }
    }

    fn reads(registry: &mut CounterRegistry, text: &str, n: usize) -> Vec<String> {
        (0..n).map(|_| registry.substitute(1, 0, text).unwrap()).collect()
    }

    #[test]
    fn counter_advances() {
        let mut registry = CounterRegistry::new();
        assert_eq!(reads(&mut registry, "{10:5}", 3), vec!["10", "15", "20"]);
    }

    #[test]
    fn counter_repeats() {
        let mut registry = CounterRegistry::new();
        assert_eq!(reads(&mut registry, "{10:5:1}", 4), vec!["10", "10", "15", "15"]);
    }

    #[test]
    fn counter_counts_down() {
        let mut registry = CounterRegistry::new();
        assert_eq!(reads(&mut registry, "{3:-1}", 3), vec!["3", "2", "1"]);
    }

    #[test]
    fn data_loop_round_robins() {
        let mut registry = CounterRegistry::new();
        assert_eq!(
            reads(&mut registry, "{red|green|blue}", 4),
            vec!["red", "green", "blue", "red"]
        );
    }

    #[test]
    fn data_loop_repeats() {
        let mut registry = CounterRegistry::new();
        assert_eq!(reads(&mut registry, "{a|b:2}", 4), vec!["a", "a", "a", "b"]);
    }

    #[test]
    fn keys_are_scoped_by_row_and_column() {
        let mut registry = CounterRegistry::new();
        assert_eq!(registry.substitute(1, 0, "{1:1}").unwrap(), "1");
        assert_eq!(registry.substitute(1, 1, "{1:1}").unwrap(), "1");
        assert_eq!(registry.substitute(2, 0, "{1:1}").unwrap(), "1");
        assert_eq!(registry.substitute(1, 0, "{1:1}").unwrap(), "2");
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.counter(key("{1:1}"), 1, 1, 0), 3);
    }

    #[test]
    fn escaped_operators_are_skipped() {
        let mut registry = CounterRegistry::new();
        assert_eq!(registry.substitute(1, 0, "\\{1:1}").unwrap(), "\\{1:1}");
        assert!(registry.is_empty());
    }

    #[test]
    fn out_of_range_counters_are_errors() {
        let mut registry = CounterRegistry::new();
        assert!(matches!(
            registry.substitute(1, 0, "{99999999999999999999:1}"),
            Err(DataError::Pattern { .. })
        ));
        assert!(matches!(
            registry.substitute(1, 0, "{1:-99999999999999999999}"),
            Err(DataError::Pattern { .. })
        ));
        assert!(matches!(
            registry.substitute(1, 0, "{a|b:99999999999999999999}"),
            Err(DataError::Pattern { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn padding() {
        assert_eq!(apply_padding("vlan7%4").unwrap(), "vlan0007");
        assert_eq!(apply_padding("12345%3").unwrap(), "12345");
        assert_eq!(apply_padding("100\\%").unwrap(), "100\\%");
    }

    #[test]
    fn padding_width_is_capped() {
        assert_eq!(apply_padding("1%255").unwrap().len(), MAX_PAD_WIDTH);
        assert!(matches!(
            apply_padding("1%4000000000"),
            Err(DataError::Pattern { .. })
        ));
    }

    #[test]
    fn unescape() {
        assert_eq!(unescape_operators("\\{a\\}\\%"), "{a}%");
    }
}
