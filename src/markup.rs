//! Finishing pass for diff-table markup.
//!
//! Generic diff-table generators embed their own legend, wrap navigation in
//! links and fill a "next change" column. None of that means anything in a
//! static fragment, so [`finish`] strips it and puts our legend in front of
//! the table. The steps run in a fixed order; each one assumes the earlier
//! ones are done.

use std::sync::LazyLock;

use log::debug;
use regex::{Match, Regex};

pub const LEGEND: &str = r#"<div class="legend">
    <p>Legend:</p>
    <span class="legend-item added">Added</span>
    <span class="legend-item deleted">Deleted</span>
    <span class="legend-item changed">Changed</span>
</div>
"#;

static TABLE_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<table\b[^>]*>").expect("TABLE_OPEN_RE is a valid static regex pattern")
});

static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\sclass\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#)
        .expect("CLASS_ATTR_RE is a valid static regex pattern")
});

static SUMMARY_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\ssummary\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#)
        .expect("SUMMARY_ATTR_RE is a valid static regex pattern")
});

static TABLE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<table\b|</table\s*>")
        .expect("TABLE_TAG_RE is a valid static regex pattern")
});

static ANCHOR_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<a\b[^>]*>|</a\s*>").expect("ANCHOR_TAG_RE is a valid static regex pattern")
});

static NEXT_CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)(<td\b[^>]*\bclass="diff_next"[^>]*>).*?(</td\s*>)"#)
        .expect("NEXT_CELL_RE is a valid static regex pattern")
});

/// Runs all four steps in order.
pub fn finish(markup: &str) -> String {
    let markup = remove_default_legend(markup);
    let markup = unwrap_links(&markup);
    let markup = clear_next_cells(&markup);
    insert_legend(&markup)
}

/// Drops every legend table, nested tables included.
pub fn remove_default_legend(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;

    while let Some(open) = find_table(rest, is_legend_table) {
        out.push_str(&rest[..open.start()]);
        match matching_table_end(rest, open.start()) {
            Some(end) => rest = &rest[end..],
            None => {
                // unterminated: keep it rather than swallow the document
                out.push_str(&rest[open.start()..]);
                rest = "";
            }
        }
        debug!("removed default legend table");
    }
    out.push_str(rest);
    out
}

/// First `<table>` start tag whose tag text satisfies `wanted`.
fn find_table(markup: &str, wanted: fn(&str) -> bool) -> Option<Match<'_>> {
    TABLE_OPEN_RE
        .find_iter(markup)
        .find(|tag| wanted(tag.as_str()))
}

/// Value of an attribute captured by one of the `*_ATTR_RE` patterns.
fn attr_value<'t>(re: &Regex, tag: &'t str) -> Option<&'t str> {
    let caps = re.captures(tag)?;
    (1..=3).find_map(|group| caps.get(group)).map(|value| value.as_str())
}

/// Tables carrying `diff` among their classes, in any attribute order.
fn is_diff_table(tag: &str) -> bool {
    attr_value(&CLASS_ATTR_RE, tag)
        .is_some_and(|classes| classes.split_whitespace().any(|class| class == "diff"))
}

fn is_legend_table(tag: &str) -> bool {
    is_diff_table(tag) && attr_value(&SUMMARY_ATTR_RE, tag) == Some("Legends")
}

/// Byte offset just past the `</table>` closing the table opened at `start`.
fn matching_table_end(markup: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for tag in TABLE_TAG_RE.find_iter(&markup[start..]) {
        if tag.as_str().starts_with("</") {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(start + tag.end());
            }
        } else {
            depth += 1;
        }
    }
    None
}

/// Removes `<a>` tags but keeps whatever they wrapped.
pub fn unwrap_links(markup: &str) -> String {
    ANCHOR_TAG_RE.replace_all(markup, "").into_owned()
}

/// Empties every `diff_next` cell, keeping the cell itself.
pub fn clear_next_cells(markup: &str) -> String {
    NEXT_CELL_RE.replace_all(markup, "$1$2").into_owned()
}

/// Puts [`LEGEND`] right before the first diff table.
///
/// Markup without a diff table comes back unchanged.
pub fn insert_legend(markup: &str) -> String {
    let Some(table) = find_table(markup, is_diff_table) else {
        debug!("no diff table found, skipping legend");
        return markup.to_string();
    };
    let mut out = String::with_capacity(markup.len() + LEGEND.len());
    out.push_str(&markup[..table.start()]);
    out.push_str(LEGEND);
    out.push_str(&markup[table.start()..]);
    out
}
