//! Intersection of ascending line-number sequences.
//!
//! The line index and every completed filter expose their lines as a
//! [`LineSequence`]. The visible line set is the intersection of all active
//! filters, or every line when no filter is active.

use crate::file_handler::LineNumber;
use std::sync::Arc;

/// A strictly increasing sequence of 1-based line numbers
#[derive(Debug, Clone)]
pub enum LineSequence {
    /// Every line `1..=n`
    All(LineNumber),
    /// An explicit, strictly increasing list
    Only(Arc<[LineNumber]>),
}

impl LineSequence {
    pub fn empty() -> Self {
        Self::All(0)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::All(n) => *n as usize,
            Self::Only(lines) => lines.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at position `idx`
    pub fn get(&self, idx: usize) -> Option<LineNumber> {
        match self {
            Self::All(n) => (idx < *n as usize).then(|| idx as LineNumber + 1),
            Self::Only(lines) => lines.get(idx).copied(),
        }
    }

    pub fn first(&self) -> Option<LineNumber> {
        self.get(0)
    }

    pub fn last(&self) -> Option<LineNumber> {
        self.len().checked_sub(1).and_then(|idx| self.get(idx))
    }

    /// Position of the first element `>= line`; `len()` if there is none
    pub fn lower_bound(&self, line: LineNumber) -> usize {
        match self {
            Self::All(n) => (line.saturating_sub(1)).min(*n) as usize,
            Self::Only(lines) => lines.partition_point(|&l| l < line),
        }
    }

    /// Position of `line`, if present
    pub fn position(&self, line: LineNumber) -> Option<usize> {
        let idx = self.lower_bound(line);
        (self.get(idx) == Some(line)).then_some(idx)
    }

    pub fn contains(&self, line: LineNumber) -> bool {
        self.position(line).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = LineNumber> + '_ {
        (0..self.len()).filter_map(move |idx| self.get(idx))
    }

    pub fn to_vec(&self) -> Vec<LineNumber> {
        self.iter().collect()
    }
}

impl From<Vec<LineNumber>> for LineSequence {
    fn from(lines: Vec<LineNumber>) -> Self {
        Self::Only(lines.into())
    }
}

/// Anything that can take part in an intersection
pub trait Intersectable {
    /// Ascending line numbers this source contributes
    fn line_sequence(&self) -> LineSequence;
}

/// Lines visible through `filters`, or every line of `base` when there are none
///
/// A single filter's sequence is returned as is, without copying.
pub fn intersect(base: &dyn Intersectable, filters: &[&dyn Intersectable]) -> LineSequence {
    match filters {
        [] => base.line_sequence(),
        [only] => only.line_sequence(),
        _ => {
            let sequences: Vec<LineSequence> = filters.iter().map(|f| f.line_sequence()).collect();
            intersect_sequences(&sequences)
        }
    }
}

/// k-way merge intersection of ascending sequences
///
/// Repeatedly takes the maximum of the values under the cursors and advances
/// every cursor below it; when all cursors agree the value is emitted. Runs in
/// O(total length) with no copies of the inputs. Zero inputs give the empty
/// sequence.
pub fn intersect_sequences(inputs: &[LineSequence]) -> LineSequence {
    match inputs {
        [] => return LineSequence::empty(),
        [only] => return only.clone(),
        _ => {}
    }
    if inputs.iter().any(LineSequence::is_empty) {
        return LineSequence::empty();
    }

    let mut cursors = vec![0usize; inputs.len()];
    let mut out = Vec::new();

    'merge: loop {
        let mut max = 0;
        for (input, &cursor) in inputs.iter().zip(&cursors) {
            match input.get(cursor) {
                Some(value) => max = max.max(value),
                None => break 'merge,
            }
        }

        let mut agreed = true;
        for (input, cursor) in inputs.iter().zip(cursors.iter_mut()) {
            loop {
                match input.get(*cursor) {
                    None => break 'merge,
                    Some(value) if value < max => *cursor += 1,
                    Some(value) => {
                        agreed &= value == max;
                        break;
                    }
                }
            }
        }

        if agreed {
            out.push(max);
            for cursor in cursors.iter_mut() {
                *cursor += 1;
            }
        }
    }

    out.into()
}
