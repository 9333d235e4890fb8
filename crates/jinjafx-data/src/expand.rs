//! Pattern expansion.
//!
//! A single cell can describe many correlated values. [`Expander::expand`]
//! turns one cell string into every concrete variant it encodes:
//!
//! | Syntax | Meaning | Example |
//! |--------|---------|---------|
//! | `(a\|b\|c)` | alternation, empty alternatives allowed | `eth(0\|1)` → `eth0`, `eth1` |
//! | `[A-C0-2x]` | character class with same-class ranges | `[C-A]` → `C`, `B`, `A` |
//! | `{start-end:step[:repeat]}` | numeric range, each value emitted `repeat + 1` times | `{1-5:2}` → `1`, `3`, `5` |
//! | `\(` `\)` `\[` `\]` `\|` | literal characters | `\(x\)` → `(x)` |
//!
//! Sites are resolved one at a time from a worklist until no variant holds a
//! site: alternations first, then character classes, then numeric ranges.
//! Alternations resolve innermost first. Every resolved site appends the
//! chosen literal to the variant's group list, which the row multiplier uses
//! for back-references.
//!
//! A bracket expression that isn't a valid class (`[a-Z]`, `[x.y]`) stays
//! literal. A leftover unescaped `(` or `)` is an error.

use std::collections::VecDeque;

use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DataError, Result};

static NUMERIC_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{[ \t]*(\d+)[ \t]*-[ \t]*(\d+)[ \t]*:[ \t]*(\d+)[ \t]*(?::[ \t]*(\d+)[ \t]*)?\}")
        .unwrap()
});
static STRUCTURAL_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([()\[\]|])").unwrap());

/// One expanded variant and the literal chosen at each site, in resolution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub value: String,
    pub groups: Vec<String>,
}

impl Expansion {
    fn literal(value: &str) -> Self {
        Expansion {
            value: value.to_string(),
            groups: Vec::new(),
        }
    }
}

/// A resolvable site: `value[start..end]` is replaced by each choice in turn.
///
/// `count` is known before any choice is produced, so the budget can be
/// checked without materialising a large range.
struct Site {
    start: usize,
    end: usize,
    count: usize,
    choices: Box<dyn Iterator<Item = String>>,
}

impl Site {
    fn listed(start: usize, end: usize, choices: Vec<String>) -> Self {
        Site {
            start,
            end,
            count: choices.len(),
            choices: Box::new(choices.into_iter()),
        }
    }
}

/// Expands cell patterns, optionally within a variant budget.
///
/// One `Expander` lives for one run. In bounded mode every variant produced
/// by any call draws from the same budget; running out fails with
/// [`DataError::Overflow`].
#[derive(Debug, Clone, Default)]
pub struct Expander {
    limit: Option<usize>,
    remaining: usize,
}

impl Expander {
    /// Creates an expander with no variant limit.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Creates an expander that may produce at most `limit` variants in total.
    pub fn bounded(limit: usize) -> Self {
        Expander {
            limit: Some(limit),
            remaining: limit,
        }
    }

    /// Variants still allowed, or `None` when unbounded.
    pub fn remaining(&self) -> Option<usize> {
        self.limit.map(|_| self.remaining)
    }

    /// Fails up front when `count` more variants can't fit the budget.
    fn reserve(&self, count: usize) -> Result<()> {
        match self.limit {
            Some(limit) if count > self.remaining => Err(DataError::Overflow { limit }),
            _ => Ok(()),
        }
    }

    fn spend(&mut self) -> Result<()> {
        if let Some(limit) = self.limit {
            if self.remaining == 0 {
                return Err(DataError::Overflow { limit });
            }
            self.remaining -= 1;
        }
        Ok(())
    }

    /// Expands a pattern into its variants, with group selections.
    pub fn expand(&mut self, pattern: &str) -> Result<Vec<Expansion>> {
        let mut pending = VecDeque::from([Expansion::literal(pattern)]);
        let mut done = Vec::new();

        while let Some(item) = pending.pop_front() {
            let Some(site) = next_site(&item.value, pattern)? else {
                done.push(item);
                continue;
            };

            trace!(
                "expanding '{}' at {}..{} into {} choices",
                item.value,
                site.start,
                site.end,
                site.count
            );

            self.reserve(site.count)?;
            let mut children = Vec::new();
            for choice in site.choices {
                self.spend()?;
                let mut value = String::with_capacity(item.value.len() + choice.len());
                value.push_str(&item.value[..site.start]);
                value.push_str(&choice);
                value.push_str(&item.value[site.end..]);

                let mut groups = item.groups.clone();
                groups.push(choice);
                children.push(Expansion { value, groups });
            }

            // depth-first keeps variants in left-to-right choice order
            for child in children.into_iter().rev() {
                pending.push_front(child);
            }
        }

        done.into_iter()
            .map(|expansion| finish(expansion, pattern))
            .collect()
    }

    /// Expands a pattern, discarding group selections.
    pub fn expand_values(&mut self, pattern: &str) -> Result<Vec<String>> {
        Ok(self
            .expand(pattern)?
            .into_iter()
            .map(|expansion| expansion.value)
            .collect())
    }
}

/// Expands a pattern without a variant budget.
///
/// ```
/// assert_eq!(jinjafx_data::expand("(a|b)").unwrap(), vec!["a", "b"]);
/// assert_eq!(jinjafx_data::expand("[C-A]").unwrap(), vec!["C", "B", "A"]);
/// ```
pub fn expand(pattern: &str) -> Result<Vec<String>> {
    Expander::unbounded().expand_values(pattern)
}

pub(crate) fn is_escaped(bytes: &[u8], i: usize) -> bool {
    i > 0 && bytes[i - 1] == b'\\'
}

fn next_site(value: &str, pattern: &str) -> Result<Option<Site>> {
    if let Some(site) = find_alternation(value) {
        return Ok(Some(site));
    }
    if let Some(site) = find_class(value) {
        return Ok(Some(site));
    }
    find_range(value, pattern)
}

fn find_alternation(s: &str) -> Option<Site> {
    let bytes = s.as_bytes();
    let mut open = None;

    for (i, &b) in bytes.iter().enumerate() {
        if is_escaped(bytes, i) {
            continue;
        }
        match b {
            b'(' => open = Some(i),
            b')' => {
                if let Some(start) = open {
                    return Some(Site::listed(start, i + 1, split_alternatives(&s[start + 1..i])));
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on unescaped `|` outside of `{...}` so data loops survive.
fn split_alternatives(body: &str) -> Vec<String> {
    let bytes = body.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;

    for (i, &b) in bytes.iter().enumerate() {
        if is_escaped(bytes, i) {
            continue;
        }
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'|' if depth == 0 => {
                parts.push(body[last..i].to_string());
                last = i + 1;
            }
            _ => {}
        }
    }
    parts.push(body[last..].to_string());
    parts
}

fn find_class(s: &str) -> Option<Site> {
    let bytes = s.as_bytes();
    let mut from = 0;

    while let Some(offset) = bytes[from..].iter().position(|&b| b == b'[') {
        let open = from + offset;
        from = open + 1;
        if is_escaped(bytes, open) {
            continue;
        }

        let close = (open + 1..bytes.len()).find(|&i| bytes[i] == b']' && !is_escaped(bytes, i))?;
        if let Some(chars) = parse_class(&s[open + 1..close]) {
            let choices = chars.into_iter().map(String::from).collect();
            return Some(Site::listed(open, close + 1, choices));
        }
    }
    None
}

fn same_class(a: char, b: char) -> bool {
    (a.is_ascii_lowercase() && b.is_ascii_lowercase())
        || (a.is_ascii_uppercase() && b.is_ascii_uppercase())
        || (a.is_ascii_digit() && b.is_ascii_digit())
}

/// Returns the listed characters, or `None` when the body isn't a class.
fn parse_class(body: &str) -> Option<Vec<char>> {
    let chars: Vec<char> = body.chars().collect();
    if chars.is_empty() || !chars.iter().all(|c| c.is_ascii_alphanumeric() || *c == '-') {
        return None;
    }

    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c != '-' && i + 2 < chars.len() && chars[i + 1] == '-' {
            let end = chars[i + 2];
            if !same_class(c, end) {
                return None;
            }
            if c <= end {
                out.extend(c..=end);
            } else {
                out.extend((end..=c).rev());
            }
            i += 3;
        } else {
            out.push(c);
            i += 1;
        }
    }
    Some(out)
}

fn find_range(s: &str, pattern: &str) -> Result<Option<Site>> {
    let invalid = |reason: &str| DataError::Pattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    for caps in NUMERIC_RANGE.captures_iter(s) {
        let Some(whole) = caps.get(0) else { continue };
        if is_escaped(s.as_bytes(), whole.start()) {
            continue;
        }

        let number = |i: usize| -> Result<u64> {
            caps.get(i)
                .map_or(Ok(0), |m| m.as_str().parse())
                .map_err(|_| invalid("numeric range value out of range"))
        };
        let (start, end, step, repeat) = (number(1)?, number(2)?, number(3)?, number(4)?);
        if step == 0 {
            return Err(invalid("numeric range step must be greater than zero"));
        }

        let too_large = || invalid("numeric range produces too many values");
        let step = usize::try_from(step).map_err(|_| too_large())?;
        let per_value = repeat
            .checked_add(1)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(too_large)?;
        let count = (start.abs_diff(end) / step as u64)
            .checked_add(1)
            .and_then(|n| usize::try_from(n).ok())
            .and_then(|n| n.checked_mul(per_value))
            .ok_or_else(too_large)?;

        let values: Box<dyn Iterator<Item = u64>> = if start <= end {
            Box::new((start..=end).step_by(step))
        } else {
            Box::new((end..=start).rev().step_by(step))
        };
        let choices = values.flat_map(move |v| std::iter::repeat(v.to_string()).take(per_value));

        return Ok(Some(Site {
            start: whole.start(),
            end: whole.end(),
            count,
            choices: Box::new(choices),
        }));
    }
    Ok(None)
}

fn finish(expansion: Expansion, pattern: &str) -> Result<Expansion> {
    let bytes = expansion.value.as_bytes();
    if let Some(i) = (0..bytes.len()).find(|&i| matches!(bytes[i], b'(' | b')') && !is_escaped(bytes, i)) {
        let c = bytes[i] as char;
        return Err(DataError::Pattern {
            pattern: pattern.to_string(),
            reason: format!("unescaped '{}' must be escaped as '\\{}'", c, c),
        });
    }

    Ok(Expansion {
        value: unescape_structural(&expansion.value),
        groups: expansion
            .groups
            .iter()
            .map(|g| unescape_structural(g))
            .collect(),
    })
}

fn unescape_structural(s: &str) -> String {
    STRUCTURAL_ESCAPE.replace_all(s, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pattern: &str) -> Vec<String> {
        expand(pattern).unwrap()
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(values("router1"), vec!["router1"]);
        assert_eq!(values(""), vec![""]);
    }

    #[test]
    fn alternation() {
        assert_eq!(values("(a|b)"), vec!["a", "b"]);
        assert_eq!(values("x(|y)"), vec!["x", "xy"]);
        assert_eq!(values("(a|b)(1|2)"), vec!["a1", "a2", "b1", "b2"]);
        assert_eq!(values("(solo)"), vec!["solo"]);
    }

    #[test]
    fn nested_alternation_resolves_innermost_first() {
        assert_eq!(values("(a|b(1|2))"), vec!["a", "b1", "a", "b2"]);
    }

    #[test]
    fn character_classes() {
        assert_eq!(values("[A-C]"), vec!["A", "B", "C"]);
        assert_eq!(values("[C-A]"), vec!["C", "B", "A"]);
        assert_eq!(values("[a-c0-1]"), vec!["a", "b", "c", "0", "1"]);
        assert_eq!(values("[xy-]"), vec!["x", "y", "-"]);
    }

    #[test]
    fn malformed_class_is_literal() {
        assert_eq!(values("[a-Z]"), vec!["[a-Z]"]);
        assert_eq!(values("[A-9]"), vec!["[A-9]"]);
        assert_eq!(values("[x.y]"), vec!["[x.y]"]);
        assert_eq!(values("[]"), vec!["[]"]);
    }

    #[test]
    fn numeric_ranges() {
        assert_eq!(values("{1-5:2}"), vec!["1", "3", "5"]);
        assert_eq!(values("{3-1:1}"), vec!["3", "2", "1"]);
        assert_eq!(values("v{1-2:1:1}"), vec!["v1", "v1", "v2", "v2"]);
    }

    #[test]
    fn zero_step_is_an_error() {
        assert!(matches!(expand("{1-5:0}"), Err(DataError::Pattern { .. })));
    }

    #[test]
    fn counters_are_left_alone() {
        assert_eq!(values("{10:5}"), vec!["{10:5}"]);
        assert_eq!(values("{red|green}"), vec!["{red|green}"]);
    }

    #[test]
    fn escapes() {
        assert_eq!(values("\\(x\\)"), vec!["(x)"]);
        assert_eq!(values("\\[A-C\\]"), vec!["[A-C]"]);
        assert_eq!(values("(a\\|b|c)"), vec!["a|b", "c"]);
        assert_eq!(values("\\{1-2:1\\}"), vec!["\\{1-2:1\\}"]);
    }

    #[test]
    fn stray_paren_is_an_error() {
        assert!(matches!(expand("a(b"), Err(DataError::Pattern { .. })));
        assert!(matches!(expand("a)b"), Err(DataError::Pattern { .. })));
    }

    #[test]
    fn loop_inside_alternation_keeps_its_pipes() {
        assert_eq!(values("(x{a|b}|y)"), vec!["x{a|b}", "y"]);
    }

    #[test]
    fn precedence_and_group_order() {
        let expansions = Expander::unbounded().expand("[AB]{1-2:1}(x|y)").unwrap();
        let first = &expansions[0];
        assert_eq!(first.value, "A1x");
        assert_eq!(first.groups, vec!["x", "A", "1"]);
        assert_eq!(expansions.len(), 8);
    }

    #[test]
    fn groups_follow_each_variant() {
        let expansions = Expander::unbounded().expand("(a|b)-[1-2]").unwrap();
        let groups: Vec<_> = expansions.iter().map(|e| e.groups.clone()).collect();
        assert_eq!(
            groups,
            vec![
                vec!["a".to_string(), "1".to_string()],
                vec!["a".to_string(), "2".to_string()],
                vec!["b".to_string(), "1".to_string()],
                vec!["b".to_string(), "2".to_string()],
            ]
        );
    }

    #[test]
    fn budget_is_shared_across_calls() {
        let mut expander = Expander::bounded(4);
        assert_eq!(expander.expand_values("(a|b)").unwrap().len(), 2);
        assert_eq!(expander.remaining(), Some(2));
        assert!(matches!(
            expander.expand("(a|b|c)"),
            Err(DataError::Overflow { limit: 4 })
        ));
    }

    #[test]
    fn huge_range_overflows_before_expanding() {
        let mut expander = Expander::bounded(10);
        assert!(matches!(
            expander.expand("{0-4000000000:1}"),
            Err(DataError::Overflow { limit: 10 })
        ));
        assert_eq!(expander.remaining(), Some(10));
    }

    #[test]
    fn oversized_repeat_is_a_pattern_error() {
        assert!(matches!(
            expand("{1-1:1:18446744073709551615}"),
            Err(DataError::Pattern { .. })
        ));
        assert!(matches!(
            expand("{0-18446744073709551615:1:1}"),
            Err(DataError::Pattern { .. })
        ));
    }

    #[test]
    fn unbounded_has_no_budget() {
        let mut expander = Expander::unbounded();
        assert_eq!(expander.remaining(), None);
        assert_eq!(expander.expand_values("{1-100:1}").unwrap().len(), 100);
    }
}
