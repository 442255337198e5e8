//! Ratcliff-Obershelp ("gestalt") sequence matching.
//!
//! The matcher repeatedly finds the longest contiguous matching block and
//! recurses into the pieces on either side of it. It works over any slice of
//! hashable items, so the same code drives the line alignment (items are
//! lines) and the character-level similarity ratio (items are chars).

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Sequences of `b` at least this long get the popular-element heuristic.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Predicate marking items of `b` that must never start a match.
pub type JunkFn<T> = fn(&T) -> bool;

/// A matching block: `a[a..a + size] == b[b..b + size]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Match {
    pub a: usize,
    pub b: usize,
    pub size: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// One edit step turning `a[a_start..a_end]` into `b[b_start..b_end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Opcode {
    pub tag: Tag,
    pub a_start: usize,
    pub a_end: usize,
    pub b_start: usize,
    pub b_end: usize,
}

pub struct SequenceMatcher<'a, T: Eq + Hash> {
    a: &'a [T],
    b: &'a [T],
    b2j: HashMap<&'a T, Vec<usize>>,
    bjunk: HashSet<&'a T>,
    /// Occurrences of every item of `b`, junk included.
    bcount: HashMap<&'a T, usize>,
}

impl<'a, T: Eq + Hash> SequenceMatcher<'a, T> {
    pub fn new(a: &'a [T], b: &'a [T]) -> Self {
        Self::with_options(a, b, None, true)
    }

    pub fn with_junk(a: &'a [T], b: &'a [T], is_junk: JunkFn<T>) -> Self {
        Self::with_options(a, b, Some(is_junk), true)
    }

    /// Builds the index of `b`.
    ///
    /// Junk items are dropped from the index. With `autojunk`, items that
    /// make up more than 1% of a long `b` are dropped as well ("popular"),
    /// which keeps matching fast on repetitive input at the cost of exactness.
    pub fn with_options(
        a: &'a [T],
        b: &'a [T],
        is_junk: Option<JunkFn<T>>,
        autojunk: bool,
    ) -> Self {
        let mut b2j: HashMap<&'a T, Vec<usize>> = HashMap::new();
        for (j, item) in b.iter().enumerate() {
            b2j.entry(item).or_default().push(j);
        }
        let bcount = b2j
            .iter()
            .map(|(item, indices)| (*item, indices.len()))
            .collect();

        let mut bjunk = HashSet::new();
        if let Some(is_junk) = is_junk {
            bjunk.extend(b2j.keys().copied().filter(|item| is_junk(item)));
            b2j.retain(|item, _| !bjunk.contains(item));
        }

        if autojunk && b.len() >= AUTOJUNK_MIN_LEN {
            let ntest = b.len() / 100 + 1;
            b2j.retain(|_, indices| indices.len() <= ntest);
        }

        Self {
            a,
            b,
            b2j,
            bjunk,
            bcount,
        }
    }

    /// Swaps in a new `a`, keeping the index of `b`.
    ///
    /// Comparing many sequences against one `b` this way builds its index
    /// only once.
    pub fn set_a(&mut self, a: &'a [T]) {
        self.a = a;
    }

    fn is_bjunk(&self, item: &T) -> bool {
        self.bjunk.contains(item)
    }

    /// Longest matching block in `a[alo..ahi]` and `b[blo..bhi]`.
    ///
    /// Ties go to the block starting earliest in `a`, then earliest in `b`.
    /// The block is then widened over equal neighbours, non-junk first and
    /// junk second, so junk only ever extends a match and never seeds one.
    pub fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> Match {
        let (a, b) = (self.a, self.b);
        let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0);

        // j2len[j] = length of the longest match ending with a[i - 1] and b[j]
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for (i, item) in a.iter().enumerate().take(ahi).skip(alo) {
            let mut new_j2len = HashMap::new();
            if let Some(indices) = self.b2j.get(item) {
                for &j in indices {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let prev = j
                        .checked_sub(1)
                        .and_then(|p| j2len.get(&p))
                        .copied()
                        .unwrap_or(0);
                    let k = prev + 1;
                    new_j2len.insert(j, k);
                    if k > bestsize {
                        besti = i + 1 - k;
                        bestj = j + 1 - k;
                        bestsize = k;
                    }
                }
            }
            j2len = new_j2len;
        }

        for junk_pass in [false, true] {
            while besti > alo
                && bestj > blo
                && self.is_bjunk(&b[bestj - 1]) == junk_pass
                && a[besti - 1] == b[bestj - 1]
            {
                besti -= 1;
                bestj -= 1;
                bestsize += 1;
            }
            while besti + bestsize < ahi
                && bestj + bestsize < bhi
                && self.is_bjunk(&b[bestj + bestsize]) == junk_pass
                && a[besti + bestsize] == b[bestj + bestsize]
            {
                bestsize += 1;
            }
        }

        Match {
            a: besti,
            b: bestj,
            size: bestsize,
        }
    }

    /// Non-overlapping matching blocks in increasing order, adjacent blocks
    /// collapsed, terminated by the `(len_a, len_b, 0)` sentinel.
    pub fn matching_blocks(&self) -> Vec<Match> {
        let (la, lb) = (self.a.len(), self.b.len());
        let mut queue = vec![(0, la, 0, lb)];
        let mut blocks = Vec::new();

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let found = self.find_longest_match(alo, ahi, blo, bhi);
            if found.size == 0 {
                continue;
            }
            blocks.push(found);
            if alo < found.a && blo < found.b {
                queue.push((alo, found.a, blo, found.b));
            }
            if found.a + found.size < ahi && found.b + found.size < bhi {
                queue.push((found.a + found.size, ahi, found.b + found.size, bhi));
            }
        }
        blocks.sort_unstable();

        let mut collapsed: Vec<Match> = Vec::with_capacity(blocks.len() + 1);
        for block in blocks {
            match collapsed.last_mut() {
                Some(last) if last.a + last.size == block.a && last.b + last.size == block.b => {
                    last.size += block.size;
                }
                _ => collapsed.push(block),
            }
        }
        collapsed.push(Match {
            a: la,
            b: lb,
            size: 0,
        });
        collapsed
    }

    pub fn opcodes(&self) -> Vec<Opcode> {
        let (mut i, mut j) = (0, 0);
        let mut opcodes = Vec::new();

        for block in self.matching_blocks() {
            let tag = match (i < block.a, j < block.b) {
                (true, true) => Some(Tag::Replace),
                (true, false) => Some(Tag::Delete),
                (false, true) => Some(Tag::Insert),
                (false, false) => None,
            };
            if let Some(tag) = tag {
                opcodes.push(Opcode {
                    tag,
                    a_start: i,
                    a_end: block.a,
                    b_start: j,
                    b_end: block.b,
                });
            }
            i = block.a + block.size;
            j = block.b + block.size;
            if block.size > 0 {
                opcodes.push(Opcode {
                    tag: Tag::Equal,
                    a_start: block.a,
                    a_end: i,
                    b_start: block.b,
                    b_end: j,
                });
            }
        }
        opcodes
    }

    /// Total number of items covered by matching blocks.
    pub fn matched_len(&self) -> usize {
        self.matching_blocks().iter().map(|block| block.size).sum()
    }

    /// Similarity in `[0, 1]`: `2 * M / T`, where `M` is the matched item
    /// count and `T` the combined length. Two empty sequences are identical.
    pub fn ratio(&self) -> f64 {
        calculate_ratio(self.matched_len(), self.a.len() + self.b.len())
    }

    /// Upper bound on [`ratio`](Self::ratio) from item counts alone.
    pub fn quick_ratio(&self) -> f64 {
        let mut avail: HashMap<&T, usize> = HashMap::new();
        let mut matches = 0;
        for item in self.a {
            let left = avail
                .entry(item)
                .or_insert_with(|| self.bcount.get(item).copied().unwrap_or(0));
            if *left > 0 {
                *left -= 1;
                matches += 1;
            }
        }
        calculate_ratio(matches, self.a.len() + self.b.len())
    }

    /// Upper bound on [`quick_ratio`](Self::quick_ratio) from lengths alone.
    pub fn real_quick_ratio(&self) -> f64 {
        real_quick_ratio(self.a.len(), self.b.len())
    }
}

pub(crate) fn real_quick_ratio(len_a: usize, len_b: usize) -> f64 {
    calculate_ratio(len_a.min(len_b), len_a + len_b)
}

fn calculate_ratio(matches: usize, length: usize) -> f64 {
    if length == 0 {
        return 1.0;
    }
    2.0 * matches as f64 / length as f64
}
