//! Core identifiers and lifecycle states
//!
//! - [`TxId`]: transaction identity
//! - [`Scn`]: logical timestamp ordering transaction events
//! - [`SequenceNo`]: statement position inside one transaction
//! - [`TxState`]: commit lifecycle

use crate::codec::{encoded_length_vi64, Decode, Encode, Reader, Writer};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a statement inside a transaction
///
/// Undo actions describe ranges of sequence numbers that were rolled back.
pub type SequenceNo = i64;

/// Transaction identifier
///
/// Encoded as a fixed 8-byte little-endian integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId(i64);

impl TxId {
    /// Identity of a reset record
    pub const INVALID: TxId = TxId(i64::MAX);

    /// Wrap a raw transaction id
    pub const fn new(id: i64) -> Self {
        TxId(id)
    }

    /// Raw id
    pub const fn get_id(&self) -> i64 {
        self.0
    }

    /// True unless this is the reset value or negative
    pub const fn is_valid(&self) -> bool {
        self.0 >= 0 && self.0 != i64::MAX
    }
}

impl Default for TxId {
    fn default() -> Self {
        TxId::INVALID
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encode for TxId {
    fn encoded_len(&self) -> usize {
        8
    }

    fn encode(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put_i64_le(self.0)
    }
}

impl Decode for TxId {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        r.get_i64_le().map(TxId)
    }
}

/// System change number: a comparable logical timestamp
///
/// `Scn::INVALID` is the reset value. Ordering compares raw values, so callers
/// check `is_valid()` before comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scn(u64);

impl Scn {
    /// Reset value
    pub const INVALID: Scn = Scn(u64::MAX);

    /// Smallest valid SCN
    pub const MIN: Scn = Scn(0);

    /// Wrap a raw value
    pub const fn new(val: u64) -> Self {
        Scn(val)
    }

    /// Raw value
    pub const fn get_val(&self) -> u64 {
        self.0
    }

    /// True unless this is the reset value
    pub const fn is_valid(&self) -> bool {
        self.0 != u64::MAX
    }

    /// Restore the reset value
    pub fn reset(&mut self) {
        *self = Scn::INVALID;
    }
}

impl Default for Scn {
    fn default() -> Self {
        Scn::INVALID
    }
}

impl fmt::Display for Scn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("INVALID")
        }
    }
}

impl Encode for Scn {
    fn encoded_len(&self) -> usize {
        encoded_length_vi64(self.0 as i64)
    }

    fn encode(&self, w: &mut Writer<'_>) -> Result<()> {
        w.put_vi64(self.0 as i64)
    }
}

impl Decode for Scn {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        r.get_vi64().map(|v| Scn(v as u64))
    }
}

/// Commit lifecycle of a transaction
///
/// ```text
/// Running ──► Commit
///    │  ├───► ElrCommit ──► Commit
///    │  │         └──────► Abort
///    └──┴───► Abort
/// ```
///
/// `ElrCommit` (early lock release) is quasi-terminal: the transaction is
/// logically committed but can still be finalized. `Commit` and `Abort` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(i32)]
pub enum TxState {
    /// Transaction still executing
    #[default]
    Running = 0,
    /// Committed
    Commit = 1,
    /// Committed with early lock release
    ElrCommit = 2,
    /// Rolled back
    Abort = 3,
}

impl TxState {
    /// Number of defined states
    pub const MAX_STATE_CNT: i32 = 4;

    /// Wire value
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Parse a wire value
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(TxState::Running),
            1 => Some(TxState::Commit),
            2 => Some(TxState::ElrCommit),
            3 => Some(TxState::Abort),
            _ => None,
        }
    }

    /// Upper-case name used in dumps
    pub const fn as_str(self) -> &'static str {
        match self {
            TxState::Running => "RUNNING",
            TxState::Commit => "COMMIT",
            TxState::ElrCommit => "ELR_COMMIT",
            TxState::Abort => "ABORT",
        }
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: TxState) -> bool {
        matches!(
            (self, next),
            (TxState::Running, TxState::Commit)
                | (TxState::Running, TxState::ElrCommit)
                | (TxState::Running, TxState::Abort)
                | (TxState::ElrCommit, TxState::Commit)
                | (TxState::ElrCommit, TxState::Abort)
        )
    }

    /// Whether a commit version must be present in this state
    pub fn requires_commit_version(self) -> bool {
        matches!(self, TxState::Commit | TxState::ElrCommit)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i32> for TxState {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        TxState::from_i32(value)
            .ok_or_else(|| Error::deserialize(format!("unknown tx state {}", value)))
    }
}
