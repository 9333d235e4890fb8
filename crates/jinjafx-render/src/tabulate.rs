//! Aligned text tables for `jinjafx.tabulate()`.
//!
//! Columns whose every value is numeric are right aligned, all others left
//! aligned. Widths are display widths, so wide characters line up.

use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableStyle {
    /// Pipe table with a `:--`/`--:` alignment row.
    #[default]
    Default,
    /// Space separated columns, no rules.
    Plain,
}

impl TableStyle {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "default" => Some(TableStyle::Default),
            "plain" => Some(TableStyle::Plain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

fn is_numeric(cell: &str) -> bool {
    cell.trim().parse::<f64>().is_ok()
}

fn pad(cell: &str, width: usize, align: Align) -> String {
    let fill = " ".repeat(width.saturating_sub(cell.width()));
    match align {
        Align::Left => format!("{}{}", cell, fill),
        Align::Right => format!("{}{}", fill, cell),
    }
}

fn cell(row: &[String], c: usize) -> &str {
    row.get(c).map_or("", String::as_str)
}

/// Renders `header` and `rows` as a table, without a trailing newline.
///
/// Short rows are padded with empty cells.
pub fn tabulate(header: &[String], rows: &[Vec<String>], style: TableStyle) -> String {
    let columns = header.len();

    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            rows.iter()
                .map(|row| cell(row, c).width())
                .chain(std::iter::once(header[c].width()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let aligns: Vec<Align> = (0..columns)
        .map(|c| {
            if !rows.is_empty() && rows.iter().all(|row| is_numeric(cell(row, c))) {
                Align::Right
            } else {
                Align::Left
            }
        })
        .collect();

    let format_row = |row: &[String]| -> Vec<String> {
        (0..columns)
            .map(|c| pad(cell(row, c), widths[c], aligns[c]))
            .collect()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    match style {
        TableStyle::Default => {
            lines.push(format!("| {} |", format_row(header).join(" | ")));
            let rule: Vec<String> = widths
                .iter()
                .zip(&aligns)
                .map(|(width, align)| match align {
                    Align::Left => format!(":{}", "-".repeat(width + 1)),
                    Align::Right => format!("{}:", "-".repeat(width + 1)),
                })
                .collect();
            lines.push(format!("|{}|", rule.join("|")));
            for row in rows {
                lines.push(format!("| {} |", format_row(row).join(" | ")));
            }
        }
        TableStyle::Plain => {
            lines.push(format_row(header).join("  ").trim_end().to_string());
            for row in rows {
                lines.push(format_row(row).join("  ").trim_end().to_string());
            }
        }
    }
    lines.join("\n")
}
