//! Optional syntax coloring for diff cells.

use log::{debug, warn};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};

/// Light theme, so foreground colors stay readable on the diff palette.
const PREFERRED_THEME: &str = "InspiredGitHub";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn css(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Foreground color of each char of a line, one entry per char.
pub type LineColors = Vec<Rgb>;

pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
    syntax_name: String,
}

fn resolve_theme(theme_set: &ThemeSet) -> Theme {
    if let Some(theme) = theme_set.themes.get(PREFERRED_THEME) {
        return theme.clone();
    }
    theme_set
        .themes
        .values()
        .next()
        .cloned()
        .unwrap_or_default()
}

impl Highlighter {
    /// Looks the token up as a language name, then as a file extension.
    ///
    /// Returns `None` for unknown tokens and for plain text, where coloring
    /// would add markup without adding information.
    pub fn for_token(token: &str) -> Option<Self> {
        let token = token.trim().trim_start_matches('.');
        if token.is_empty() {
            return None;
        }
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let syntax_name = {
            let syntax = find_syntax(&syntax_set, token)?;
            if syntax.name == syntax_set.find_syntax_plain_text().name {
                return None;
            }
            syntax.name.clone()
        };
        debug!("highlighting cells as {syntax_name}");

        let theme = resolve_theme(&ThemeSet::load_defaults());
        Some(Self {
            syntax_set,
            theme,
            syntax_name,
        })
    }

    pub fn syntax_name(&self) -> &str {
        &self.syntax_name
    }

    /// Colors a whole side in order, since a line's colors depend on the
    /// parse state left by the lines before it.
    ///
    /// A line that fails to highlight comes back empty and is drawn plain.
    pub fn highlight<'l>(&self, lines: impl IntoIterator<Item = &'l str>) -> Vec<LineColors> {
        let Some(syntax) = self.syntax_set.find_syntax_by_name(&self.syntax_name) else {
            return Vec::new();
        };
        let mut highlighter = HighlightLines::new(syntax, &self.theme);

        let mut colored = Vec::new();
        for (idx, line) in lines.into_iter().enumerate() {
            let with_ending = format!("{line}\n");
            match highlighter.highlight_line(&with_ending, &self.syntax_set) {
                Ok(tokens) => {
                    let mut colors = Vec::with_capacity(line.len());
                    for (style, token) in tokens {
                        let fg = style.foreground;
                        let rgb = Rgb {
                            r: fg.r,
                            g: fg.g,
                            b: fg.b,
                        };
                        colors.extend(token.chars().filter(|c| *c != '\n').map(|_| rgb));
                    }
                    colored.push(colors);
                }
                Err(err) => {
                    warn!("failed to highlight line {}: {err}", idx + 1);
                    colored.push(Vec::new());
                }
            }
        }
        colored
    }
}

fn find_syntax<'s>(syntax_set: &'s SyntaxSet, token: &str) -> Option<&'s SyntaxReference> {
    syntax_set
        .find_syntax_by_token(token)
        .or_else(|| syntax_set.find_syntax_by_extension(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_and_plain_tokens_disable_coloring() {
        assert!(Highlighter::for_token("").is_none());
        assert!(Highlighter::for_token("no-such-language-xyz").is_none());
        assert!(Highlighter::for_token("txt").is_none());
    }

    #[test]
    fn test_colors_cover_every_char() {
        let highlighter = Highlighter::for_token("rs").expect("rust syntax is bundled");
        assert_eq!(highlighter.syntax_name(), "Rust");
        let lines = ["fn main() {", "", "    let x = \"hi\";", "}"];
        let colors = highlighter.highlight(lines);
        assert_eq!(colors.len(), lines.len());
        for (line, line_colors) in lines.iter().zip(&colors) {
            assert_eq!(line_colors.len(), line.chars().count());
        }
    }

    #[test]
    fn test_rgb_css() {
        assert_eq!(Rgb { r: 0, g: 128, b: 255 }.css(), "#0080ff");
    }
}
