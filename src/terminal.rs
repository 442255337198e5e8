//! Side-by-side rendering for terminals.

use crossterm::style::{StyledContent, Stylize};
use log::warn;

use crate::engine::{AlignedDiff, DiffLine, DiffRow, RowKind};

const NUMBER_WIDTH: usize = 5;
const SEPARATOR: &str = " │ ";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminalOptions {
    /// Width of each text column, in chars.
    pub width: usize,
    pub color: bool,
    pub full: bool,
    pub tab_size: usize,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self {
            width: 60,
            color: true,
            full: false,
            tab_size: crate::render::DEFAULT_TAB_SIZE,
        }
    }
}

pub fn render(
    diff: &AlignedDiff,
    left_label: &str,
    right_label: &str,
    options: &TerminalOptions,
) -> String {
    let mut out = String::new();
    let indent = " ".repeat(NUMBER_WIDTH + 3);
    let left_header = fit(&format!("{indent}{left_label}"), column_width(options));
    let header = format!("{left_header}{SEPARATOR}{indent}{right_label}");
    out.push_str(&paint(header.trim_end().to_string(), options.color, |s| s.bold()));
    out.push('\n');

    if options.full {
        for row in &diff.rows {
            write_row(&mut out, row, options);
        }
        return out;
    }

    if diff.hunks.is_empty() {
        out.push_str("No differences found\n");
        return out;
    }

    for hunk in &diff.hunks {
        let Some(rows) = diff.rows.get(hunk.rows.clone()) else {
            warn!("skipping hunk with rows {:?} out of range", hunk.rows);
            continue;
        };
        let left_start = rows.iter().find_map(|row| row.left.as_ref().map(|l| l.number));
        let right_start = rows.iter().find_map(|row| row.right.as_ref().map(|l| l.number));
        let marker = format!(
            "@@ -{} +{} @@",
            left_start.unwrap_or(0),
            right_start.unwrap_or(0)
        );
        out.push_str(&paint(marker, options.color, |s| s.cyan()));
        out.push('\n');
        for row in rows {
            write_row(&mut out, row, options);
        }
    }
    out
}

/// Number, gutter marker, space and text.
fn column_width(options: &TerminalOptions) -> usize {
    NUMBER_WIDTH + 3 + options.width
}

fn write_row(out: &mut String, row: &DiffRow, options: &TerminalOptions) {
    let left = side(row.left.as_ref(), row.kind, true, options);
    let right = side(row.right.as_ref(), row.kind, false, options);
    out.push_str(&left);
    out.push_str(SEPARATOR);
    out.push_str(right.trim_end());
    out.push('\n');
}

fn side(line: Option<&DiffLine>, kind: RowKind, is_left: bool, options: &TerminalOptions) -> String {
    let Some(line) = line else {
        return " ".repeat(column_width(options));
    };
    let marker = match kind {
        RowKind::Unchanged => ' ',
        RowKind::Added => '+',
        RowKind::Deleted => '-',
        RowKind::Changed => '~',
    };
    let text = fit(&expand_tabs(&line.text, options.tab_size), options.width);
    let cell = format!(
        "{:>width$} {marker} {text}",
        line.number,
        width = NUMBER_WIDTH
    );

    let color = options.color;
    match kind {
        RowKind::Unchanged => cell,
        RowKind::Added => paint(cell, color, |s| s.green()),
        RowKind::Deleted => paint(cell, color, |s| s.red()),
        RowKind::Changed if is_left => paint(cell, color, |s| s.yellow()),
        RowKind::Changed => paint(cell, color, |s| s.yellow().bold()),
    }
}

fn paint(text: String, color: bool, style: impl FnOnce(String) -> StyledContent<String>) -> String {
    if color {
        style(text).to_string()
    } else {
        text
    }
}

/// Pads or truncates to exactly `width` chars.
fn fit(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count > width {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        if width > 0 {
            cut.push('…');
        }
        cut
    } else {
        format!("{text}{}", " ".repeat(width - count))
    }
}

fn expand_tabs(text: &str, tab_size: usize) -> String {
    if tab_size == 0 || !text.contains('\t') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut col = 0;
    for ch in text.chars() {
        if ch == '\t' {
            let width = tab_size - col % tab_size;
            out.push_str(&" ".repeat(width));
            col += width;
        } else {
            out.push(ch);
            col += 1;
        }
    }
    out
}
