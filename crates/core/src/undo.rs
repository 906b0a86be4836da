//! Rolled-back sequence-number intervals
//!
//! An [`UndoAction`] `{from, to}` records that a transaction rolled back to
//! savepoint `to`, discarding every statement after it up to and including
//! `from`. The covered interval is `(to, from]`.

use crate::codec::{encoded_length_vi64, Decode, Encode, Reader, Writer};
use crate::error::{Error, Result};
use crate::types::SequenceNo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A rolled-back interval `(to, from]`
///
/// The all-zero value is the no-op sentinel and covers nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UndoAction {
    /// Highest rolled-back sequence number (inclusive)
    pub undo_from: SequenceNo,
    /// Savepoint the transaction rolled back to (exclusive)
    pub undo_to: SequenceNo,
}

impl UndoAction {
    /// Create an action covering `(to, from]`
    ///
    /// Fails with `InvalidArgument` unless `from > to >= 0`.
    pub fn new(from: SequenceNo, to: SequenceNo) -> Result<Self> {
        let action = UndoAction {
            undo_from: from,
            undo_to: to,
        };
        if !action.is_valid() {
            return Err(Error::invalid_argument(format!(
                "malformed undo range {{from:{}, to:{}}}",
                from, to
            )));
        }
        Ok(action)
    }

    /// True for a well-formed interval
    pub fn is_valid(&self) -> bool {
        self.undo_to >= 0 && self.undo_from > self.undo_to
    }

    /// True for the no-op sentinel
    pub fn is_noop(&self) -> bool {
        self.undo_from == 0 && self.undo_to == 0
    }

    /// Whether `other` lies entirely inside this interval
    pub fn contains(&self, other: &UndoAction) -> bool {
        self.undo_from >= other.undo_from && self.undo_to <= other.undo_to
    }

    /// Whether `seq_no` was rolled back by this action
    pub fn is_contain(&self, seq_no: SequenceNo) -> bool {
        self.undo_to < seq_no && seq_no <= self.undo_from
    }

    /// Whether the two intervals overlap or share an endpoint
    pub fn overlaps_or_touches(&self, other: &UndoAction) -> bool {
        self.undo_to <= other.undo_from && other.undo_to <= self.undo_from
    }

    /// Whether [`UndoAction::merge`] may combine the two actions.
    ///
    /// Nested intervals always merge. Partially overlapping or adjacent
    /// intervals merge into their union. Disjoint intervals never merge, since
    /// the union would also cover the gap between them.
    pub fn is_mergeable(&self, other: &UndoAction) -> bool {
        self.contains(other) || other.contains(self) || self.overlaps_or_touches(other)
    }

    /// Widen this action to cover `other` as well
    pub fn merge(&mut self, other: &UndoAction) {
        self.undo_from = self.undo_from.max(other.undo_from);
        self.undo_to = self.undo_to.min(other.undo_to);
    }
}

impl fmt::Display for UndoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{from:{}, to:{}}}", self.undo_from, self.undo_to)
    }
}

impl Encode for UndoAction {
    fn encoded_len(&self) -> usize {
        encoded_length_vi64(self.undo_from) + encoded_length_vi64(self.undo_to)
    }

    fn encode(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put_vi64(self.undo_from)?;
        w.put_vi64(self.undo_to)
    }
}

impl Decode for UndoAction {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let action = UndoAction {
            undo_from: r.get_vi64()?,
            undo_to: r.get_vi64()?,
        };
        if !action.is_valid() && !action.is_noop() {
            return Err(Error::deserialize(format!("malformed undo action {}", action)));
        }
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn action(from: i64, to: i64) -> UndoAction {
        UndoAction::new(from, to).unwrap()
    }

    #[test]
    fn test_new_rejects_malformed_ranges() {
        assert!(UndoAction::new(5, 5).is_err());
        assert!(UndoAction::new(3, 7).is_err());
        assert!(UndoAction::new(3, -1).is_err());
        assert!(UndoAction::new(1, 0).is_ok());
    }

    #[test]
    fn test_noop_sentinel() {
        let noop = UndoAction::default();
        assert!(noop.is_noop());
        assert!(!noop.is_valid());
        assert!(!noop.is_contain(0));
    }

    #[test]
    fn test_is_contain_half_open() {
        let a = action(10, 5);
        assert!(!a.is_contain(5));
        assert!(a.is_contain(6));
        assert!(a.is_contain(10));
        assert!(!a.is_contain(11));
    }

    #[test]
    fn test_contains() {
        let outer = action(20, 0);
        let inner = action(15, 5);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.contains(&outer));
    }

    #[test]
    fn test_mergeable_cases() {
        // nested
        assert!(action(20, 0).is_mergeable(&action(15, 5)));
        // partial overlap
        assert!(action(20, 10).is_mergeable(&action(15, 5)));
        // adjacent: (10, 20] and (20, 25]
        assert!(action(25, 20).is_mergeable(&action(20, 10)));
        // disjoint: (0, 10] and (15, 20]
        assert!(!action(20, 15).is_mergeable(&action(10, 0)));
    }

    #[test]
    fn test_merge_takes_union() {
        let mut a = action(20, 10);
        a.merge(&action(15, 5));
        assert_eq!(a, action(20, 5));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let bad = UndoAction {
            undo_from: 1,
            undo_to: 9,
        };
        let bytes = bad.to_bytes().unwrap();
        let mut r = Reader::new(&bytes);
        assert!(matches!(UndoAction::decode(&mut r), Err(Error::Deserialize(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(action(25, 0).to_string(), "{from:25, to:0}");
    }

    proptest! {
        #[test]
        fn prop_merge_never_shrinks(
            a_to in 0i64..1000, a_len in 1i64..1000,
            b_to in 0i64..1000, b_len in 1i64..1000,
        ) {
            let a = action(a_to + a_len, a_to);
            let b = action(b_to + b_len, b_to);
            let mut merged = a;
            merged.merge(&b);
            prop_assert!(merged.contains(&a));
            prop_assert!(merged.contains(&b));
        }

        #[test]
        fn prop_mergeable_union_covers_no_gap(
            a_to in 0i64..200, a_len in 1i64..50,
            b_to in 0i64..200, b_len in 1i64..50,
        ) {
            let a = action(a_to + a_len, a_to);
            let b = action(b_to + b_len, b_to);
            if a.is_mergeable(&b) {
                let mut merged = a;
                merged.merge(&b);
                for seq in (merged.undo_to + 1)..=merged.undo_from {
                    prop_assert!(a.is_contain(seq) || b.is_contain(seq));
                }
            }
        }
    }
}
