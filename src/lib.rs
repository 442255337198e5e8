//! Side-by-side text comparison.
//!
//! [`compute_diff`] takes two texts and returns a self-contained HTML
//! fragment showing their line-level differences together with a single
//! character-level "difference percentage".
//!
//! ```
//! let comparison = catdiff::compute_diff("a\nb\nc", "a\nx\nc", 3);
//! assert_eq!(comparison.dissimilarity_percent, 20.0);
//! assert!(comparison.rendered_fragment.contains("<table class=\"diff\""));
//! ```

pub mod engine;
pub mod highlight;
pub mod input;
pub mod markup;
pub mod matcher;
pub mod render;
pub mod terminal;

use log::info;

use crate::engine::{compute_dissimilarity, compute_line_diff, split_lines, AlignedDiff};
use crate::highlight::Highlighter;
use crate::render::{RenderOptions, Renderer, DEFAULT_LEFT_LABEL, DEFAULT_RIGHT_LABEL, DEFAULT_TAB_SIZE};

pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Everything a caller needs to show one comparison.
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub rendered_fragment: String,
    pub dissimilarity_percent: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffOptions {
    pub context_lines: usize,
    /// Show every row instead of only the changes and their context.
    pub full: bool,
    pub left_label: String,
    pub right_label: String,
    pub tab_size: usize,
    pub wrap_column: Option<usize>,
    /// Language name or file extension used to color cell text.
    pub syntax: Option<String>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
            full: false,
            left_label: DEFAULT_LEFT_LABEL.to_string(),
            right_label: DEFAULT_RIGHT_LABEL.to_string(),
            tab_size: DEFAULT_TAB_SIZE,
            wrap_column: None,
            syntax: None,
        }
    }
}

impl DiffOptions {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            full: self.full,
            tab_size: self.tab_size,
            wrap_column: self.wrap_column,
        }
    }
}

pub fn compute_diff(previous_text: &str, current_text: &str, context_lines: usize) -> Comparison {
    let options = DiffOptions {
        context_lines,
        ..DiffOptions::default()
    };
    compute_diff_with(previous_text, current_text, &options)
}

/// Loads the syntax named by `options.syntax` for this one comparison.
///
/// Loading syntect's bundled syntaxes is slow; callers comparing repeatedly
/// should build the [`Highlighter`] once and use [`compute_diff_highlighted`].
pub fn compute_diff_with(previous_text: &str, current_text: &str, options: &DiffOptions) -> Comparison {
    let highlighter = options.syntax.as_deref().and_then(Highlighter::for_token);
    compute_diff_highlighted(previous_text, current_text, options, highlighter.as_ref())
}

/// Like [`compute_diff_with`], coloring with `highlighter` and ignoring
/// `options.syntax`.
pub fn compute_diff_highlighted(
    previous_text: &str,
    current_text: &str,
    options: &DiffOptions,
    highlighter: Option<&Highlighter>,
) -> Comparison {
    let aligned = align(previous_text, current_text, options.context_lines);
    let dissimilarity_percent = compute_dissimilarity(previous_text, current_text);

    let rendered_fragment = Renderer::new(options.render_options())
        .with_highlighter(highlighter)
        .render(&aligned, &options.left_label, &options.right_label);

    let stats = aligned.stats();
    info!(
        "compared texts: {} changed, {} added, {} deleted rows, {dissimilarity_percent}% different",
        stats.changed, stats.added, stats.deleted
    );

    Comparison {
        rendered_fragment,
        dissimilarity_percent,
    }
}

/// Shows whole percentages with one decimal (`20.0`), others as rounded.
pub fn format_percent(percent: f64) -> String {
    if percent.fract() == 0.0 {
        format!("{percent:.1}")
    } else {
        format!("{percent}")
    }
}

/// Splits both texts into lines and aligns them.
pub fn align(previous_text: &str, current_text: &str, context_lines: usize) -> AlignedDiff {
    compute_line_diff(
        &split_lines(previous_text),
        &split_lines(current_text),
        context_lines,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_diff_identical() {
        let comparison = compute_diff("foo", "foo", DEFAULT_CONTEXT_LINES);
        assert_eq!(comparison.dissimilarity_percent, 0.0);
        assert!(comparison.rendered_fragment.contains("No Differences Found"));
    }

    #[test]
    fn test_compute_diff_with_labels() {
        let options = DiffOptions {
            left_label: "before.rs".to_string(),
            right_label: "after.rs".to_string(),
            ..DiffOptions::default()
        };
        let comparison = compute_diff_with("", "hello", &options);
        assert_eq!(comparison.dissimilarity_percent, 100.0);
        assert!(comparison.rendered_fragment.contains(">before.rs</th>"));
        assert!(comparison.rendered_fragment.contains(">after.rs</th>"));
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(20.0), "20.0");
        assert_eq!(format_percent(0.0), "0.0");
        assert_eq!(format_percent(12.35), "12.35");
    }

    #[test]
    fn test_prebuilt_highlighter_is_reused() {
        let highlighter = Highlighter::for_token("rs").expect("rust syntax is bundled");
        let options = DiffOptions::default();
        for (previous, current) in [("let x = 1;", "let x = 2;"), ("fn a() {}", "fn b() {}")] {
            let comparison =
                compute_diff_highlighted(previous, current, &options, Some(&highlighter));
            assert!(comparison.rendered_fragment.contains("<span style=\"color:#"));
        }
        let plain = compute_diff_highlighted("let x = 1;", "let x = 2;", &options, None);
        assert!(!plain.rendered_fragment.contains("<span style="));
    }

    #[test]
    fn test_syntax_coloring_nests_inside_marks() {
        let options = DiffOptions {
            syntax: Some("rs".to_string()),
            ..DiffOptions::default()
        };
        let comparison = compute_diff_with("let x = 1;", "let x = 2;", &options);
        assert!(comparison
            .rendered_fragment
            .contains("<span class=\"diff_chg\"><span style=\"color:#"));
    }
}
