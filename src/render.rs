//! HTML rendering of an [`AlignedDiff`].
//!
//! The table is built straight from the rows: six columns (navigation, line
//! number and text for each side), one `<tbody>` per hunk in context mode.
//! The result goes through [`markup::finish`] for the legend and gets the
//! embedded stylesheet appended, so it can be dropped into a sandboxed
//! frame with no network access.

use log::{debug, warn};

use crate::engine::{AlignedDiff, DiffLine, DiffRow, MarkKind, RowKind};
use crate::highlight::{Highlighter, LineColors, Rgb};
use crate::markup;

pub const DEFAULT_LEFT_LABEL: &str = "Previous Code";
pub const DEFAULT_RIGHT_LABEL: &str = "Current Code";
pub const DEFAULT_TAB_SIZE: usize = 8;

const TABLE_ID_PREFIX: &str = "difflib_chg_to0__";

pub const STYLE: &str = r#"<style>
    body {
        background-color: transparent;
        font-family: sans-serif;
        color: black;
    }
    table.diff {
        width: 100%;
        border-collapse: collapse;
        background-color: white;
        font-family: monospace;
    }
    .diff_header {
        background-color: #f2f2f2;
        font-weight: bold;
        padding: 6px;
    }
    td, th {
        padding: 6px;
        border: 1px solid #ccc;
    }
    td.diff_add, span.diff_add {
        background-color: #c8facc !important;
    }
    td.diff_sub, span.diff_sub {
        background-color: #f9cbcb !important;
    }
    td.diff_chg, span.diff_chg {
        background-color: #fcf6b1 !important;
    }
    td.diff_chg span.diff_add {
        background-color: #9ef0a6 !important;
    }
    td.diff_chg span.diff_sub {
        background-color: #f2a3a3 !important;
    }
    td.diff_chg span.diff_chg {
        background-color: #f5e96b !important;
    }

    .legend {
        margin-bottom: 20px;
    }
    .legend-item {
        display: inline-block;
        padding: 5px 10px;
        margin-right: 10px;
        border-radius: 5px;
        font-weight: bold;
        color: black;
    }
    .added { background-color: #c8facc; }
    .deleted { background-color: #f9cbcb; }
    .changed { background-color: #fcf6b1; }

    .legend > p {
        font-weight: bold;
        margin-bottom: 5px;
        color: black;
    }

    @media (prefers-color-scheme: dark) {
        .legend > p {
            color: white;
        }
    }

    @media (prefers-color-scheme: light) {
        .legend > p {
            color: black;
        }
    }
</style>
"#;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Show every row instead of only the hunks.
    pub full: bool,
    pub tab_size: usize,
    /// Split text cells longer than this many chars onto continuation rows.
    pub wrap_column: Option<usize>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            full: false,
            tab_size: DEFAULT_TAB_SIZE,
            wrap_column: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Glyph {
    ch: char,
    mark: Option<MarkKind>,
    color: Option<Rgb>,
}

#[derive(Default)]
struct SideColors {
    left: Vec<LineColors>,
    right: Vec<LineColors>,
}

pub struct Renderer<'a> {
    options: RenderOptions,
    highlighter: Option<&'a Highlighter>,
}

/// Renders with default options and no syntax coloring.
pub fn render(diff: &AlignedDiff, left_label: &str, right_label: &str) -> String {
    Renderer::new(RenderOptions::default()).render(diff, left_label, right_label)
}

impl<'a> Renderer<'a> {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            highlighter: None,
        }
    }

    pub fn with_highlighter(mut self, highlighter: Option<&'a Highlighter>) -> Self {
        self.highlighter = highlighter;
        self
    }

    pub fn render(&self, diff: &AlignedDiff, left_label: &str, right_label: &str) -> String {
        let table = self.table(diff, left_label, right_label);
        let mut fragment = markup::finish(&table);
        fragment.push_str(STYLE);
        debug!("rendered {} bytes of diff markup", fragment.len());
        fragment
    }

    fn table(&self, diff: &AlignedDiff, left_label: &str, right_label: &str) -> String {
        let colors = self.side_colors(diff);
        let mut out = String::new();

        out.push_str(&format!(
            "<table class=\"diff\" id=\"{TABLE_ID_PREFIX}top\" cellspacing=\"0\" cellpadding=\"0\" rules=\"groups\">\n"
        ));
        for _ in 0..2 {
            out.push_str("    <colgroup></colgroup> <colgroup></colgroup> <colgroup></colgroup>\n");
        }
        out.push_str(&format!(
            "    <thead><tr><th class=\"diff_next\"><br /></th><th colspan=\"2\" class=\"diff_header\">{}</th><th class=\"diff_next\"><br /></th><th colspan=\"2\" class=\"diff_header\">{}</th></tr></thead>\n",
            escape_html(left_label),
            escape_html(right_label),
        ));

        if self.options.full {
            out.push_str("    <tbody>\n");
            if diff.rows.is_empty() {
                write_message_row(&mut out, "Empty File");
            }
            for (idx, row) in diff.rows.iter().enumerate() {
                let anchor = diff.hunks.iter().position(|hunk| hunk.rows.start == idx);
                self.write_row(&mut out, row, anchor, &colors);
            }
            out.push_str("    </tbody>\n");
        } else if diff.hunks.is_empty() {
            out.push_str("    <tbody>\n");
            write_message_row(&mut out, "No Differences Found");
            out.push_str("    </tbody>\n");
        } else {
            for (n, hunk) in diff.hunks.iter().enumerate() {
                let Some(rows) = diff.rows.get(hunk.rows.clone()) else {
                    warn!("skipping hunk {n}: rows {:?} out of range", hunk.rows);
                    continue;
                };
                out.push_str("    <tbody>\n");
                for (offset, row) in rows.iter().enumerate() {
                    let anchor = (offset == 0).then_some(n);
                    self.write_row(&mut out, row, anchor, &colors);
                }
                out.push_str("    </tbody>\n");
            }
        }

        out.push_str("</table>\n");
        out
    }

    fn side_colors(&self, diff: &AlignedDiff) -> SideColors {
        let Some(highlighter) = self.highlighter else {
            return SideColors::default();
        };
        let left = diff
            .rows
            .iter()
            .filter_map(|row| row.left.as_ref())
            .map(|line| line.text.as_str());
        let right = diff
            .rows
            .iter()
            .filter_map(|row| row.right.as_ref())
            .map(|line| line.text.as_str());
        SideColors {
            left: highlighter.highlight(left),
            right: highlighter.highlight(right),
        }
    }

    fn write_row(&self, out: &mut String, row: &DiffRow, anchor: Option<usize>, colors: &SideColors) {
        let class = text_class(row.kind);
        let left = row
            .left
            .as_ref()
            .map(|line| (line, self.cell_chunks(line, line_colors(&colors.left, line))));
        let right = row
            .right
            .as_ref()
            .map(|line| (line, self.cell_chunks(line, line_colors(&colors.right, line))));

        let height = [left.as_ref(), right.as_ref()]
            .into_iter()
            .flatten()
            .map(|(_, chunks)| chunks.len())
            .max()
            .unwrap_or(1);

        for part in 0..height {
            match anchor.filter(|_| part == 0) {
                Some(n) => out.push_str(&format!("        <tr id=\"{TABLE_ID_PREFIX}{n}\">")),
                None => out.push_str("        <tr>"),
            }
            write_side(out, left.as_ref(), part, class);
            write_side(out, right.as_ref(), part, class);
            out.push_str("</tr>\n");
        }
    }

    /// Escaped cell markup, one entry per display row.
    fn cell_chunks(&self, line: &DiffLine, colors: Option<&LineColors>) -> Vec<String> {
        let glyphs = expand_glyphs(line, colors, self.options.tab_size);
        match self.options.wrap_column.filter(|width| *width > 0) {
            Some(width) if glyphs.len() > width => {
                glyphs.chunks(width).map(glyph_markup).collect()
            }
            _ => vec![glyph_markup(&glyphs)],
        }
    }
}

fn line_colors<'c>(side: &'c [LineColors], line: &DiffLine) -> Option<&'c LineColors> {
    line.number.checked_sub(1).and_then(|idx| side.get(idx))
}

fn text_class(kind: RowKind) -> Option<&'static str> {
    match kind {
        RowKind::Unchanged => None,
        RowKind::Added => Some("diff_add"),
        RowKind::Deleted => Some("diff_sub"),
        RowKind::Changed => Some("diff_chg"),
    }
}

fn mark_class(kind: MarkKind) -> &'static str {
    match kind {
        MarkKind::Added => "diff_add",
        MarkKind::Deleted => "diff_sub",
        MarkKind::Changed => "diff_chg",
    }
}

fn write_side(
    out: &mut String,
    side: Option<&(&DiffLine, Vec<String>)>,
    part: usize,
    class: Option<&str>,
) {
    out.push_str("<td class=\"diff_next\"></td>");
    let Some((line, chunk)) = side.and_then(|(line, chunks)| chunks.get(part).map(|c| (line, c)))
    else {
        out.push_str("<td class=\"diff_header\"></td><td nowrap=\"nowrap\"></td>");
        return;
    };

    if part == 0 {
        out.push_str(&format!("<td class=\"diff_header\">{}</td>", line.number));
    } else {
        out.push_str("<td class=\"diff_header\">&gt;</td>");
    }
    match class {
        Some(class) => out.push_str(&format!(
            "<td class=\"{class}\" nowrap=\"nowrap\">{chunk}</td>"
        )),
        None => out.push_str(&format!("<td nowrap=\"nowrap\">{chunk}</td>")),
    }
}

fn write_message_row(out: &mut String, message: &str) {
    let cell = format!("<td class=\"diff_next\"></td><td></td><td>&nbsp;{message}&nbsp;</td>");
    out.push_str(&format!("        <tr>{cell}{cell}</tr>\n"));
}

fn expand_glyphs(line: &DiffLine, colors: Option<&LineColors>, tab_size: usize) -> Vec<Glyph> {
    let mut glyphs = Vec::with_capacity(line.text.len());
    for (offset, ch) in line.text.chars().enumerate() {
        let glyph = Glyph {
            ch,
            mark: line.mark_at(offset),
            color: colors.and_then(|colors| colors.get(offset)).copied(),
        };
        if ch == '\t' && tab_size > 0 {
            let width = tab_size - glyphs.len() % tab_size;
            glyphs.extend(std::iter::repeat(Glyph { ch: ' ', ..glyph }).take(width));
        } else {
            glyphs.push(glyph);
        }
    }
    glyphs
}

/// Groups runs of equal mark and color into spans, marks outermost.
fn glyph_markup(glyphs: &[Glyph]) -> String {
    let mut out = String::new();
    for run in glyphs.chunk_by(|a, b| a.mark == b.mark && a.color == b.color) {
        let text: String = run.iter().map(|glyph| glyph.ch).collect();
        let first = run[0];
        if let Some(mark) = first.mark {
            out.push_str(&format!("<span class=\"{}\">", mark_class(mark)));
        }
        if let Some(color) = first.color {
            out.push_str(&format!("<span style=\"color:{}\">", color.css()));
        }
        out.push_str(&escape_cell_text(&text));
        if first.color.is_some() {
            out.push_str("</span>");
        }
        if first.mark.is_some() {
            out.push_str("</span>");
        }
    }
    out
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Like [`escape_html`], but spaces become `&nbsp;` so indentation survives.
fn escape_cell_text(text: &str) -> String {
    escape_html(text).replace(' ', "&nbsp;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{compute_line_diff, split_lines, Hunk};
    use pretty_assertions::assert_eq;

    fn diff(left: &str, right: &str, context: usize) -> AlignedDiff {
        compute_line_diff(&split_lines(left), &split_lines(right), context)
    }

    #[test]
    fn test_changed_row_markup() {
        let html = render(&diff("a\nb\nc", "a\nx\nc", 3), "Old", "New");
        assert!(html.contains(
            "<td class=\"diff_next\"></td><td class=\"diff_header\">2</td><td class=\"diff_chg\" nowrap=\"nowrap\"><span class=\"diff_sub\">b</span></td>"
        ));
        assert!(html.contains(
            "<td class=\"diff_header\">2</td><td class=\"diff_chg\" nowrap=\"nowrap\"><span class=\"diff_add\">x</span></td>"
        ));
        assert!(html.contains("<td class=\"diff_header\">1</td><td nowrap=\"nowrap\">a</td>"));
        assert!(html.contains(">Old</th>"));
        assert!(html.contains(">New</th>"));
    }

    #[test]
    fn test_legend_precedes_table_and_style_follows() {
        let html = render(&diff("a", "b", 3), DEFAULT_LEFT_LABEL, DEFAULT_RIGHT_LABEL);
        let legend = html.find("<div class=\"legend\">").expect("legend present");
        let table = html.find("<table class=\"diff\"").expect("table present");
        let style = html.find("<style>").expect("style present");
        assert!(legend < table);
        assert!(table < style);
        assert!(html.ends_with(STYLE));
    }

    #[test]
    fn test_context_mode_elides_far_rows() {
        let left: String = (1..=30).map(|n| format!("line {n}\n")).collect();
        let right = left.replace("line 15\n", "line fifteen\n");
        let html = render(&diff(&left, &right, 2), "a", "b");
        assert!(html.contains(">13</td>"));
        assert!(html.contains(">17</td>"));
        assert!(!html.contains(">12</td>"));
        assert!(!html.contains(">18</td>"));
        assert_eq!(html.matches("<tbody>").count(), 1);
    }

    #[test]
    fn test_full_mode_keeps_every_row() {
        let left: String = (1..=30).map(|n| format!("line {n}\n")).collect();
        let right = left.replace("line 15\n", "line fifteen\n");
        let options = RenderOptions {
            full: true,
            ..RenderOptions::default()
        };
        let html = Renderer::new(options).render(&diff(&left, &right, 2), "a", "b");
        assert!(html.contains(">1</td>"));
        assert!(html.contains(">30</td>"));
        assert!(html.contains("<tr id=\"difflib_chg_to0__0\">"));
    }

    #[test]
    fn test_separate_hunks_get_separate_bodies() {
        let left: String = (1..=30).map(|n| format!("line {n}\n")).collect();
        let right = left
            .replace("line 3\n", "line three\n")
            .replace("line 25\n", "line twenty-five\n");
        let html = render(&diff(&left, &right, 3), "a", "b");
        assert_eq!(html.matches("<tbody>").count(), 2);
        assert!(html.contains("<tr id=\"difflib_chg_to0__1\">"));
    }

    #[test]
    fn test_identical_and_empty_messages() {
        let same = render(&diff("foo", "foo", 3), "a", "b");
        assert!(same.contains("&nbsp;No Differences Found&nbsp;"));

        let options = RenderOptions {
            full: true,
            ..RenderOptions::default()
        };
        let empty = Renderer::new(options).render(&diff("", "", 3), "a", "b");
        assert!(empty.contains("&nbsp;Empty File&nbsp;"));
    }

    #[test]
    fn test_cell_text_is_escaped_and_tabs_expand() {
        let html = render(&diff("x", "\t<b> & \"q\"", 3), "a", "b");
        assert!(html.contains(
            "&nbsp;&nbsp;&nbsp;&nbsp;&nbsp;&nbsp;&nbsp;&nbsp;&lt;b&gt;&nbsp;&amp;&nbsp;&quot;q&quot;"
        ));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_wrap_column_adds_continuation_rows() {
        let options = RenderOptions {
            wrap_column: Some(4),
            ..RenderOptions::default()
        };
        let html = Renderer::new(options).render(&diff("abcdefghij", "abcdefghiX", 3), "a", "b");
        assert_eq!(html.matches("<td class=\"diff_header\">&gt;</td>").count(), 4);
    }

    #[test]
    fn test_added_row_leaves_left_side_blank() {
        let html = render(&diff("", "new", 3), "a", "b");
        assert!(html.contains(
            "<tr id=\"difflib_chg_to0__0\"><td class=\"diff_next\"></td><td class=\"diff_header\"></td><td nowrap=\"nowrap\"></td><td class=\"diff_next\"></td><td class=\"diff_header\">1</td><td class=\"diff_add\" nowrap=\"nowrap\">new</td></tr>"
        ));
    }

    #[test]
    fn test_out_of_range_hunks_are_skipped() {
        let broken = AlignedDiff {
            rows: Vec::new(),
            hunks: vec![Hunk { rows: 0..1 }],
            context_lines: 3,
        };
        let html = render(&broken, "a", "b");
        assert!(html.contains("</table>"));
        assert_eq!(html.matches("<tbody>").count(), 0);

        let mut aligned = diff("a\nb", "a\nc", 0);
        aligned.hunks.push(Hunk { rows: 1..9 });
        aligned.hunks.push(Hunk { rows: 5..2 });
        let html = render(&aligned, "a", "b");
        assert_eq!(html.matches("<tbody>").count(), 1);
    }

    #[test]
    fn test_line_number_zero_renders_without_colors() {
        let highlighter = Highlighter::for_token("rs").expect("rust syntax is bundled");
        let aligned = AlignedDiff {
            rows: vec![DiffRow {
                kind: RowKind::Added,
                left: None,
                right: Some(DiffLine {
                    number: 0,
                    text: "let x = 1;".to_string(),
                    marks: Vec::new(),
                }),
            }],
            hunks: vec![Hunk { rows: 0..1 }],
            context_lines: 3,
        };
        let html = Renderer::new(RenderOptions::default())
            .with_highlighter(Some(&highlighter))
            .render(&aligned, "a", "b");
        assert!(html.contains("<td class=\"diff_header\">0</td>"));
        assert!(html.contains("let&nbsp;x&nbsp;=&nbsp;1;"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let aligned = diff("one\ntwo\nthree", "one\n2\nthree\nfour", 1);
        assert_eq!(render(&aligned, "a", "b"), render(&aligned, "a", "b"));
    }
}
