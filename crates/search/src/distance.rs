//! Tree edit-distance kernel
//!
//! Distance between two forests is the minimum-cost sequence of unit-cost
//! operations: delete a token (its children become siblings), insert a
//! token, or match two tokens (cost 0 when the labels agree, 1 for a
//! rename) and recurse into their children. Text and commands share one
//! label space.
//!
//! Because deletion splices children in place of their parent, removing
//! the head of a forest is exactly advancing one position in the preorder
//! label sequence ([`TermSeq`]). The recursion therefore runs over pairs
//! of preorder positions `(i, j)`, and a position pair is the structural
//! identity of the forest pair, which makes it the memo key. The cache
//! lives for a single top-level call and is released on return.
//!
//! Three entry points:
//! - [`edit_distance`]: the full symmetric distance;
//! - [`left_edit_distance`]: the left-anchored variant, where exhausting
//!   the left side is free (the left forest occurs as a prefix);
//! - [`index_distance`]: the operational distance of the metric tree,
//!   the minimum left-anchored distance against every top-level suffix of
//!   the right side, letting a short query match anywhere within a larger
//!   fragment.

use texsearch_core::TermSeq;

const UNSET: u32 = u32::MAX;

/// Full edit distance between two flattened forests
///
/// Symmetric, zero on equal forests, and bounded by
/// `left.cost() + right.cost()` (delete everything on both sides).
pub fn edit_distance(left: &TermSeq, right: &TermSeq) -> usize {
    let mut kernel = Kernel::new(left.terms(), right.terms(), false);
    kernel.distance(0, 0) as usize
}

/// Left-anchored edit distance
///
/// Identical recursion, except that once the left side is exhausted the
/// remainder of the right side costs nothing: the left forest has been
/// matched as a prefix. Exhausting the right side still pays for every
/// remaining left token, so the result is bounded by `left.cost()`.
pub fn left_edit_distance(left: &TermSeq, right: &TermSeq) -> usize {
    let mut kernel = Kernel::new(left.terms(), right.terms(), true);
    kernel.distance(0, 0) as usize
}

/// Index distance: best left-anchored match against any suffix of `target`
///
/// The minimum over `target`'s top-level suffixes of the left-anchored
/// distance from `query`. The empty suffix is always present, so the
/// result never exceeds `query.cost()`. Asymmetric: the query side is
/// always the left argument. Not a true metric; the tree treats it as one.
pub fn index_distance(query: &TermSeq, target: &TermSeq) -> usize {
    // One memo is shared across all anchor points: each suffix start is
    // just another right-hand position in the same table.
    let mut kernel = Kernel::new(query.terms(), target.terms(), true);
    let mut best = query.cost() as u32;
    for start in target.suffix_starts() {
        best = best.min(kernel.distance(0, start));
        if best == 0 {
            break;
        }
    }
    best as usize
}

/// Memoized recursion over preorder position pairs
struct Kernel<'a> {
    left: &'a [String],
    right: &'a [String],
    anchored: bool,
    memo: Vec<u32>,
    width: usize,
}

impl<'a> Kernel<'a> {
    fn new(left: &'a [String], right: &'a [String], anchored: bool) -> Self {
        let width = right.len() + 1;
        Kernel {
            left,
            right,
            anchored,
            memo: vec![UNSET; (left.len() + 1) * width],
            width,
        }
    }

    fn distance(&mut self, i: usize, j: usize) -> u32 {
        if i == self.left.len() {
            return if self.anchored {
                0
            } else {
                (self.right.len() - j) as u32
            };
        }
        if j == self.right.len() {
            return (self.left.len() - i) as u32;
        }

        let slot = i * self.width + j;
        if self.memo[slot] != UNSET {
            return self.memo[slot];
        }

        let delete_right = 1 + self.distance(i, j + 1);
        let delete_left = 1 + self.distance(i + 1, j);
        let rename = u32::from(self.left[i] != self.right[j]);
        let match_heads = rename + self.distance(i + 1, j + 1);

        let best = delete_right.min(delete_left).min(match_heads);
        self.memo[slot] = best;
        best
    }
}
