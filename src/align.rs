use std::fmt;

use serde::Serialize;
use tracing::trace;

/// One step of an edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Consumes one old and one new element that are equal.
    Match,
    /// Consumes one new element.
    Insert,
    /// Consumes one old element.
    Delete,
    /// Consumes one old and one new element that differ.
    Replace,
}

impl Op {
    pub fn symbol(self) -> char {
        match self {
            Op::Match => 'm',
            Op::Insert => 'i',
            Op::Delete => 'd',
            Op::Replace => 'x',
        }
    }

    /// True if the step advances through the old sequence.
    pub fn consumes_old(self) -> bool {
        !matches!(self, Op::Insert)
    }

    /// True if the step advances through the new sequence.
    pub fn consumes_new(self) -> bool {
        !matches!(self, Op::Delete)
    }
}

/// Edit script produced by [`align`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Alignment(Vec<Op>);

impl Alignment {
    pub fn ops(&self) -> &[Op] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn count(&self, op: Op) -> usize {
        self.0.iter().filter(|o| **o == op).count()
    }

    /// Walk the script, yielding each op with the old and new indices it
    /// refers to. An index is `None` when the op does not consume that side.
    pub fn steps(&self) -> impl Iterator<Item = (Op, Option<usize>, Option<usize>)> + '_ {
        let (mut old, mut new) = (0, 0);
        self.0.iter().map(move |&op| {
            let old_idx = op.consumes_old().then(|| {
                old += 1;
                old - 1
            });
            let new_idx = op.consumes_new().then(|| {
                new += 1;
                new - 1
            });
            (op, old_idx, new_idx)
        })
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|op| write!(f, "{}", op.symbol()))
    }
}

impl IntoIterator for Alignment {
    type Item = Op;
    type IntoIter = std::vec::IntoIter<Op>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Align `old` against `new` using structural equality.
///
/// The common prefix and suffix are matched directly; the rest goes through
/// a Needleman-Wunsch table, and equal-length delete/insert runs are folded
/// into `Replace`. The backtrack prefers `Match`, then `Insert`, then
/// `Delete`, so read forwards every changed block lists its deletions before
/// its insertions.
pub fn align<T: PartialEq>(old: &[T], new: &[T]) -> Alignment {
    Alignment(fold_replacements(align_raw(old, new)))
}

/// Like [`align`] but without folding delete/insert runs into `Replace`.
pub fn align_raw<T: PartialEq>(old: &[T], new: &[T]) -> Vec<Op> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    if prefix == old.len() && prefix == new.len() {
        return vec![Op::Match; prefix];
    }

    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let middle_old = &old[prefix..old.len() - suffix];
    let middle_new = &new[prefix..new.len() - suffix];
    trace!(
        prefix,
        suffix,
        old = middle_old.len(),
        new = middle_new.len(),
        "aligning middle slice"
    );

    let mut ops = vec![Op::Match; prefix];
    ops.extend(needleman_wunsch(middle_old, middle_new));
    ops.extend(std::iter::repeat_n(Op::Match, suffix));
    ops
}

/// Dynamic-programming alignment rewarding matches, O(n*m) time and space.
fn needleman_wunsch<T: PartialEq>(old: &[T], new: &[T]) -> Vec<Op> {
    if old.is_empty() {
        return vec![Op::Insert; new.len()];
    }
    if new.is_empty() {
        return vec![Op::Delete; old.len()];
    }

    let (rows, cols) = (old.len() + 1, new.len() + 1);
    let mut score = vec![0usize; rows * cols];
    let at = |i: usize, j: usize| i * cols + j;

    for i in 1..rows {
        for j in 1..cols {
            let best = score[at(i - 1, j)].max(score[at(i, j - 1)]);
            score[at(i, j)] = if old[i - 1] == new[j - 1] {
                best.max(score[at(i - 1, j - 1)] + 1)
            } else {
                best
            };
        }
    }

    let mut ops = Vec::with_capacity(rows + cols);
    let (mut i, mut j) = (old.len(), new.len());
    while i > 0 || j > 0 {
        let op = if i == 0 {
            Op::Insert
        } else if j == 0 {
            Op::Delete
        } else if old[i - 1] == new[j - 1] && score[at(i, j)] == score[at(i - 1, j - 1)] + 1 {
            Op::Match
        } else if score[at(i, j)] == score[at(i, j - 1)] {
            Op::Insert
        } else {
            Op::Delete
        };
        if op.consumes_old() {
            i -= 1;
        }
        if op.consumes_new() {
            j -= 1;
        }
        ops.push(op);
    }
    ops.reverse();
    ops
}

/// Fold a run of `n` deletes immediately followed by a run of exactly `n`
/// inserts into `n` replaces.
pub fn fold_replacements(ops: Vec<Op>) -> Vec<Op> {
    let mut out = Vec::with_capacity(ops.len());
    let mut idx = 0;

    while idx < ops.len() {
        if ops[idx] != Op::Delete {
            out.push(ops[idx]);
            idx += 1;
            continue;
        }
        let deletes = ops[idx..].iter().take_while(|op| **op == Op::Delete).count();
        let inserts = ops[idx + deletes..]
            .iter()
            .take_while(|op| **op == Op::Insert)
            .count();
        if deletes == inserts {
            out.extend(std::iter::repeat_n(Op::Replace, deletes));
        } else {
            out.extend(std::iter::repeat_n(Op::Delete, deletes));
            out.extend(std::iter::repeat_n(Op::Insert, inserts));
        }
        idx += deletes + inserts;
    }

    out
}
