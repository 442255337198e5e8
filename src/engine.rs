//! Line alignment and the character-level dissimilarity score.
//!
//! The two are independent: a one-character edit inside a long
//! line makes the whole line `Changed` while barely moving the percentage.

use std::ops::Range;

use log::debug;

use crate::matcher::{SequenceMatcher, Tag};

/// Pairs scoring above this character ratio are shown as one changed row.
const CHANGED_LINE_CUTOFF: f64 = 0.74999;

/// How far from its diagonal a right line looks for a partner.
const SYNC_WINDOW: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RowKind {
    Unchanged,
    Added,
    Deleted,
    Changed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkKind {
    Added,
    Deleted,
    Changed,
}

/// Intraline change over a range of char offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mark {
    pub range: Range<usize>,
    pub kind: MarkKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffLine {
    /// 1-based line number in its input.
    pub number: usize,
    pub text: String,
    pub marks: Vec<Mark>,
}

impl DiffLine {
    fn plain(number: usize, text: &str) -> Self {
        Self {
            number,
            text: text.to_string(),
            marks: Vec::new(),
        }
    }

    /// Intraline mark covering the char at `offset`, if any.
    pub fn mark_at(&self, offset: usize) -> Option<MarkKind> {
        self.marks
            .iter()
            .find(|mark| mark.range.contains(&offset))
            .map(|mark| mark.kind)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffRow {
    pub kind: RowKind,
    pub left: Option<DiffLine>,
    pub right: Option<DiffLine>,
}

/// A window of rows holding at least one change plus its context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk {
    pub rows: Range<usize>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub unchanged: usize,
    pub added: usize,
    pub deleted: usize,
    pub changed: usize,
}

/// Full side-by-side alignment of two line sequences.
///
/// Every input line sits on its side of exactly one row, in input order.
/// `hunks` only says which rows a context view should keep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlignedDiff {
    pub rows: Vec<DiffRow>,
    pub hunks: Vec<Hunk>,
    pub context_lines: usize,
}

impl AlignedDiff {
    pub fn is_identical(&self) -> bool {
        self.hunks.is_empty()
    }

    pub fn stats(&self) -> DiffStats {
        let mut stats = DiffStats::default();
        for row in &self.rows {
            match row.kind {
                RowKind::Unchanged => stats.unchanged += 1,
                RowKind::Added => stats.added += 1,
                RowKind::Deleted => stats.deleted += 1,
                RowKind::Changed => stats.changed += 1,
            }
        }
        stats
    }
}

/// Line boundaries besides `\r\n`: the ASCII and Unicode line, paragraph,
/// page and record separators.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\u{0b}'
            | '\u{0c}'
            | '\u{1c}'
            | '\u{1d}'
            | '\u{1e}'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// Splits on `\r\n` and on every single-char line break, form feeds and
/// U+2028 included.
///
/// Empty lines survive as empty strings; a final line break does not start
/// another line.
pub fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        match rest.find(is_line_break) {
            Some(pos) => {
                lines.push(rest[..pos].to_string());
                let skip = if rest[pos..].starts_with("\r\n") {
                    2
                } else {
                    rest[pos..].chars().next().map_or(1, char::len_utf8)
                };
                rest = &rest[pos + skip..];
            }
            None => {
                lines.push(rest.to_string());
                break;
            }
        }
    }
    lines
}

fn is_char_junk(c: &char) -> bool {
    matches!(c, ' ' | '\t')
}

fn whole_line(len: usize, kind: MarkKind) -> Vec<Mark> {
    if len == 0 {
        return Vec::new();
    }
    vec![Mark { range: 0..len, kind }]
}

struct RowBuilder<'a> {
    left: &'a [String],
    right: &'a [String],
    left_chars: Vec<Vec<char>>,
    right_chars: Vec<Vec<char>>,
    rows: Vec<DiffRow>,
}

impl<'a> RowBuilder<'a> {
    fn new(left: &'a [String], right: &'a [String]) -> Self {
        Self {
            left,
            right,
            left_chars: left.iter().map(|line| line.chars().collect()).collect(),
            right_chars: right.iter().map(|line| line.chars().collect()).collect(),
            rows: Vec::new(),
        }
    }

    fn unchanged(&mut self, i: usize, j: usize) {
        self.rows.push(DiffRow {
            kind: RowKind::Unchanged,
            left: Some(DiffLine::plain(i + 1, &self.left[i])),
            right: Some(DiffLine::plain(j + 1, &self.right[j])),
        });
    }

    fn deleted(&mut self, range: Range<usize>) {
        for i in range {
            self.rows.push(DiffRow {
                kind: RowKind::Deleted,
                left: Some(DiffLine::plain(i + 1, &self.left[i])),
                right: None,
            });
        }
    }

    fn added(&mut self, range: Range<usize>) {
        for j in range {
            self.rows.push(DiffRow {
                kind: RowKind::Added,
                left: None,
                right: Some(DiffLine::plain(j + 1, &self.right[j])),
            });
        }
    }

    fn changed(&mut self, i: usize, j: usize) {
        let (a, b) = (&self.left_chars[i], &self.right_chars[j]);
        let mut left_marks = Vec::new();
        let mut right_marks = Vec::new();
        for op in SequenceMatcher::with_junk(a, b, is_char_junk).opcodes() {
            let (a_range, b_range) = (op.a_start..op.a_end, op.b_start..op.b_end);
            match op.tag {
                Tag::Equal => {}
                Tag::Replace => {
                    left_marks.push(Mark {
                        range: a_range,
                        kind: MarkKind::Changed,
                    });
                    right_marks.push(Mark {
                        range: b_range,
                        kind: MarkKind::Changed,
                    });
                }
                Tag::Delete => left_marks.push(Mark {
                    range: a_range,
                    kind: MarkKind::Deleted,
                }),
                Tag::Insert => right_marks.push(Mark {
                    range: b_range,
                    kind: MarkKind::Added,
                }),
            }
        }

        self.push_changed(i, j, left_marks, right_marks);
    }

    fn push_changed(&mut self, i: usize, j: usize, left_marks: Vec<Mark>, right_marks: Vec<Mark>) {
        self.rows.push(DiffRow {
            kind: RowKind::Changed,
            left: Some(DiffLine {
                number: i + 1,
                text: self.left[i].clone(),
                marks: left_marks,
            }),
            right: Some(DiffLine {
                number: j + 1,
                text: self.right[j].clone(),
                marks: right_marks,
            }),
        });
    }

    /// Pairs unrelated lines row by row, the whole left line deleted and the
    /// whole right line added. Leftovers on the longer side stay one-sided.
    fn replaced(&mut self, a: Range<usize>, b: Range<usize>) {
        let paired = a.len().min(b.len());
        for (i, j) in a.clone().zip(b.clone()) {
            let left_marks = whole_line(self.left_chars[i].len(), MarkKind::Deleted);
            let right_marks = whole_line(self.right_chars[j].len(), MarkKind::Added);
            self.push_changed(i, j, left_marks, right_marks);
        }
        self.deleted(a.start + paired..a.end);
        self.added(b.start + paired..b.end);
    }

    /// Walks a replaced block looking for line pairs to synchronize on.
    ///
    /// Each right line is compared only with the left lines within
    /// [`SYNC_WINDOW`] of its diagonal, so the work stays linear in the
    /// block size. The best pair above the cutoff becomes an unchanged or
    /// changed row; whatever lies between two such pairs is paired up plain.
    fn refine(&mut self, a: Range<usize>, b: Range<usize>) {
        let (mut dump_i, mut dump_j) = (a.start, b.start);

        for j in b.clone() {
            let diagonal = a.start + (j - b.start);
            let window = diagonal.saturating_sub(SYNC_WINDOW).max(dump_i)
                ..(diagonal + SYNC_WINDOW + 1).min(a.end);
            if window.is_empty() {
                break;
            }

            let Some(i) = self.best_partner(window, j) else {
                continue;
            };
            self.plain(dump_i..i, dump_j..j);
            if self.left[i] == self.right[j] {
                self.unchanged(i, j);
            } else {
                self.changed(i, j);
            }
            (dump_i, dump_j) = (i + 1, j + 1);
        }

        self.plain(dump_i..a.end, dump_j..b.end);
    }

    /// Left line in `window` most similar to right line `j`, if any beats
    /// the cutoff. The right line is indexed once for the whole window.
    fn best_partner(&self, window: Range<usize>, j: usize) -> Option<usize> {
        let mut cruncher = SequenceMatcher::with_junk(
            &self.left_chars[window.start],
            &self.right_chars[j],
            is_char_junk,
        );
        let mut best_ratio = CHANGED_LINE_CUTOFF;
        let mut best = None;
        for i in window {
            cruncher.set_a(&self.left_chars[i]);
            if cruncher.real_quick_ratio() <= best_ratio
                || cruncher.quick_ratio() <= best_ratio
            {
                continue;
            }
            let ratio = cruncher.ratio();
            if ratio > best_ratio {
                best_ratio = ratio;
                best = Some(i);
            }
        }
        best
    }

    fn plain(&mut self, a: Range<usize>, b: Range<usize>) {
        match (a.is_empty(), b.is_empty()) {
            (false, false) => self.replaced(a, b),
            (false, true) => self.deleted(a),
            (true, false) => self.added(b),
            (true, true) => {}
        }
    }
}

/// Groups change rows with up to `context` unchanged rows on each side.
///
/// Two changes separated by at most `2 * context` unchanged rows share a
/// hunk.
fn group_hunks(rows: &[DiffRow], context: usize) -> Vec<Hunk> {
    let mut hunks: Vec<Hunk> = Vec::new();
    for (idx, _) in rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.kind != RowKind::Unchanged)
    {
        let start = idx.saturating_sub(context);
        let end = idx.saturating_add(context).saturating_add(1).min(rows.len());
        match hunks.last_mut() {
            Some(last) if start <= last.rows.end => last.rows.end = last.rows.end.max(end),
            _ => hunks.push(Hunk { rows: start..end }),
        }
    }
    hunks
}

/// Aligns two line sequences into rows and groups the changes into hunks
/// with `context_lines` of surrounding context.
pub fn compute_line_diff(left: &[String], right: &[String], context_lines: usize) -> AlignedDiff {
    let mut builder = RowBuilder::new(left, right);

    for op in SequenceMatcher::new(left, right).opcodes() {
        let (a, b) = (op.a_start..op.a_end, op.b_start..op.b_end);
        match op.tag {
            Tag::Equal => {
                for (i, j) in a.zip(b) {
                    builder.unchanged(i, j);
                }
            }
            Tag::Delete => builder.deleted(a),
            Tag::Insert => builder.added(b),
            Tag::Replace => builder.refine(a, b),
        }
    }

    let rows = builder.rows;
    let hunks = group_hunks(&rows, context_lines);
    debug!(
        "aligned {} left and {} right lines into {} rows, {} hunks",
        left.len(),
        right.len(),
        rows.len(),
        hunks.len()
    );

    AlignedDiff {
        rows,
        hunks,
        context_lines,
    }
}

/// Percentage in `[0, 100]` by which two texts differ, to two decimals.
///
/// Works on the raw characters, line breaks included. The matched count is
/// the larger of both argument orders so the score is symmetric.
pub fn compute_dissimilarity(left: &str, right: &str) -> f64 {
    if left == right {
        return 0.0;
    }

    let a: Vec<char> = left.chars().collect();
    let b: Vec<char> = right.chars().collect();
    let total = a.len() + b.len();

    let forward = SequenceMatcher::new(&a, &b).matched_len();
    let backward = SequenceMatcher::new(&b, &a).matched_len();
    let similarity = 2.0 * forward.max(backward) as f64 / total as f64;

    round_to_hundredths((1.0 - similarity) * 100.0).clamp(0.0, 100.0)
}

/// Rounds to two decimals, ties to even, on the exact binary value.
///
/// `(value * 100.0).round()` would both round ties away from zero and pick
/// up error from the multiplication: `90.625` must give `90.62`.
fn round_to_hundredths(value: f64) -> f64 {
    if !value.is_finite() || value == 0.0 {
        return value;
    }
    let bits = value.abs().to_bits();
    let biased_exponent = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1 << 52) - 1);
    // value.abs() == mantissa * 2^exponent, exactly
    let (mantissa, exponent) = if biased_exponent == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1 << 52), biased_exponent - 1075)
    };
    if exponent >= 0 {
        return value;
    }

    let scaled = u128::from(mantissa) * 100;
    let shift = exponent.unsigned_abs();
    let hundredths = if shift >= 127 {
        0
    } else {
        let quotient = scaled >> shift;
        let remainder = scaled & ((1u128 << shift) - 1);
        let half = 1u128 << (shift - 1);
        if remainder > half || (remainder == half && quotient % 2 == 1) {
            quotient + 1
        } else {
            quotient
        }
    };
    (hundredths as f64 / 100.0).copysign(value)
}
