//! Transaction version records
//!
//! [`TxCommitData`] is the commit outcome of one transaction: its state and
//! the SCNs that order it. [`TxData`] extends it with the transaction's
//! [`UndoStatusList`], so a reader can tell both *whether* the transaction
//! committed and *which* of its statements were rolled back.
//!
//! # Wire format
//!
//! ```text
//! Envelope(
//!     tx_id:          i64 (8 bytes, little-endian)
//!     state:          vi32
//!     commit_version: vi64
//!     start_scn:      vi64
//!     end_scn:        vi64
//!     undo_status:    Envelope(..)
//! )
//! ```
//!
//! `in_version_store` is not serialized; it describes where the in-memory
//! record lives, not the transaction.

use crate::slab::SlabAllocator;
use crate::undo_node::UndoNode;
use crate::undo_status::{UndoChain, UndoStatusList};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use txdata_core::codec::{encoded_length_vi32, envelope_len};
use txdata_core::{
    Decode, Encode, Error, Reader, Result, Scn, SequenceNo, TxId, TxState, UndoAction, UndoLimits,
    Writer,
};

/// Commit outcome of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxCommitData {
    /// Transaction identity
    pub tx_id: TxId,
    /// Lifecycle state
    pub state: TxState,
    /// SCN the transaction committed at
    pub commit_version: Scn,
    /// SCN of the transaction's first log record
    pub start_scn: Scn,
    /// SCN of the transaction's last log record
    pub end_scn: Scn,
    /// Whether the record currently lives in a version store
    #[serde(skip)]
    pub in_version_store: bool,
}

impl TxCommitData {
    /// A running transaction with no SCNs assigned yet
    pub fn new(tx_id: TxId) -> Self {
        Self {
            tx_id,
            state: TxState::Running,
            commit_version: Scn::INVALID,
            start_scn: Scn::INVALID,
            end_scn: Scn::INVALID,
            in_version_store: false,
        }
    }

    /// Restore every field to its reset value
    pub fn reset(&mut self) {
        self.tx_id = TxId::INVALID;
        self.state = TxState::Running;
        self.commit_version.reset();
        self.start_scn.reset();
        self.end_scn.reset();
        self.in_version_store = false;
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(&mut self, next: TxState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::invalid_argument(format!(
                "illegal tx state transition {} -> {} for tx {}",
                self.state, next, self.tx_id
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Record the SCN range of the transaction's log
    pub fn set_scn_range(&mut self, start_scn: Scn, end_scn: Scn) -> Result<()> {
        if start_scn.is_valid() && end_scn.is_valid() && end_scn < start_scn {
            return Err(Error::invalid_argument(format!(
                "end scn {} precedes start scn {}",
                end_scn, start_scn
            )));
        }
        self.start_scn = start_scn;
        self.end_scn = end_scn;
        Ok(())
    }

    /// Commit at `commit_version`, or early-lock-release commit when `elr`
    pub fn commit(&mut self, commit_version: Scn, elr: bool) -> Result<()> {
        if !commit_version.is_valid() {
            return Err(Error::invalid_argument(format!(
                "commit of tx {} without a commit version",
                self.tx_id
            )));
        }
        let next = if elr { TxState::ElrCommit } else { TxState::Commit };
        self.transition(next)?;
        self.commit_version = commit_version;
        Ok(())
    }

    /// Roll the whole transaction back
    pub fn abort(&mut self) -> Result<()> {
        self.transition(TxState::Abort)
    }

    fn payload_len(&self) -> usize {
        self.tx_id.encoded_len()
            + encoded_length_vi32(self.state.as_i32())
            + self.commit_version.encoded_len()
            + self.start_scn.encoded_len()
            + self.end_scn.encoded_len()
    }

    fn encode_fields(&self, w: &mut Writer<'_>) -> Result<()> {
        self.tx_id.encode(w)?;
        w.put_vi32(self.state.as_i32())?;
        self.commit_version.encode(w)?;
        self.start_scn.encode(w)?;
        self.end_scn.encode(w)
    }

    fn decode_fields(r: &mut Reader<'_>) -> Result<Self> {
        let tx_id = TxId::decode(r)?;
        let state = TxState::try_from(r.get_vi32()?)?;
        Ok(Self {
            tx_id,
            state,
            commit_version: Scn::decode(r)?,
            start_scn: Scn::decode(r)?,
            end_scn: Scn::decode(r)?,
            in_version_store: false,
        })
    }
}

impl Default for TxCommitData {
    fn default() -> Self {
        Self::new(TxId::INVALID)
    }
}

impl fmt::Display for TxCommitData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{tx_id:{}, state:{}, commit_version:{}, start_scn:{}, end_scn:{}, in_version_store:{}}}",
            self.tx_id,
            self.state,
            self.commit_version,
            self.start_scn,
            self.end_scn,
            self.in_version_store
        )
    }
}

/// Commit outcome plus rollback history of one transaction
///
/// Dereferences to [`TxCommitData`], so `tx_data.state` and
/// `tx_data.commit(..)` work directly.
pub struct TxData {
    commit: TxCommitData,
    undo_status_list: UndoStatusList,
}

impl TxData {
    /// A running transaction with an empty undo history
    pub fn new(tx_id: TxId, slab: Arc<dyn SlabAllocator>, limits: UndoLimits) -> Self {
        Self {
            commit: TxCommitData::new(tx_id),
            undo_status_list: UndoStatusList::new(slab, limits),
        }
    }

    /// Commit outcome
    pub fn commit_data(&self) -> &TxCommitData {
        &self.commit
    }

    /// Rollback history
    pub fn undo_status_list(&self) -> &UndoStatusList {
        &self.undo_status_list
    }

    /// Record a rollback. See [`UndoStatusList::append_and_compact`].
    ///
    /// `SizeOverflow` means the action was stored but the history has grown
    /// large; callers should schedule cleanup rather than retry.
    pub fn add_undo_action(&self, action: UndoAction, spare: Option<Box<UndoNode>>) -> Result<()> {
        self.undo_status_list
            .append_and_compact(action, spare)
            .map_err(|e| {
                if !matches!(e, Error::SizeOverflow { .. }) {
                    tracing::warn!(tx_id = %self.commit.tx_id, %action, error = %e, "add undo action failed");
                }
                e
            })
    }

    /// Whether statement `seq_no` of this transaction was rolled back
    pub fn is_sequence_undone(&self, seq_no: SequenceNo) -> bool {
        self.undo_status_list.contains_sequence(seq_no)
    }

    /// Whether the record is complete enough to live in a version store
    pub fn is_valid_in_store(&self) -> bool {
        let tx_id = self.commit.tx_id;
        if self.commit.state == TxState::Running {
            if !self.commit.end_scn.is_valid() {
                tracing::error!(%tx_id, "running tx data without end scn");
                return false;
            }
            if self.undo_status_list.is_empty() {
                tracing::error!(%tx_id, "running tx data without undo actions");
                return false;
            }
            return true;
        }

        if !self.commit.start_scn.is_valid() || !self.commit.end_scn.is_valid() {
            tracing::error!(
                %tx_id,
                start_scn = %self.commit.start_scn,
                end_scn = %self.commit.end_scn,
                "tx data has invalid scn range"
            );
            return false;
        }
        if self.commit.end_scn < self.commit.start_scn {
            tracing::error!(
                %tx_id,
                start_scn = %self.commit.start_scn,
                end_scn = %self.commit.end_scn,
                "tx data end scn precedes start scn"
            );
            return false;
        }
        if self.commit.state != TxState::Abort && !self.commit.commit_version.is_valid() {
            tracing::error!(%tx_id, state = %self.commit.state, "tx data without commit version");
            return false;
        }
        true
    }

    /// Copy the commit outcome of `other`, keeping this record's placement
    pub fn assign_commit_data(&mut self, other: &TxCommitData) {
        let in_version_store = self.commit.in_version_store;
        self.commit = other.clone();
        self.commit.in_version_store = in_version_store;
    }

    /// Exact size of [`TxData::serialize`]'s output
    pub fn get_serialize_size(&self) -> usize {
        let chain = self.undo_status_list.read_chain();
        envelope_len(self.commit.payload_len() + chain.encoded_len())
    }

    /// Write the record at the writer's position
    pub fn serialize(&self, w: &mut Writer<'_>) -> Result<()> {
        // One read guard for both the size prediction and the write
        let chain = self.undo_status_list.read_chain();
        self.encode_with(&chain, w)
    }

    fn encode_with(&self, chain: &UndoChain, w: &mut Writer<'_>) -> Result<()> {
        let payload_len = self.commit.payload_len() + chain.encoded_len();
        w.put_envelope(payload_len, |w| {
            self.commit.encode_fields(w)?;
            chain.encode(w)
        })
        .map_err(|e| {
            tracing::warn!(tx_id = %self.commit.tx_id, error = %e, "serialize tx data failed");
            e
        })
    }

    /// Replace the record with the one encoded at the reader's position.
    ///
    /// On error the record is unchanged.
    pub fn deserialize(&mut self, r: &mut Reader<'_>) -> Result<()> {
        let result = r.get_envelope().and_then(|mut payload| {
            let commit = TxCommitData::decode_fields(&mut payload)?;
            self.undo_status_list.deserialize(&mut payload)?;
            Ok(commit)
        });
        match result {
            Ok(commit) => {
                self.assign_commit_data(&commit);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(pos = r.pos(), error = %e, "deserialize tx data failed");
                Err(e)
            }
        }
    }

    /// Deep copy with a freshly allocated undo history.
    ///
    /// The copy is not part of any version store.
    pub fn try_clone(&self) -> Result<TxData> {
        let mut commit = self.commit.clone();
        commit.in_version_store = false;
        Ok(TxData {
            commit,
            undo_status_list: self.undo_status_list.try_clone()?,
        })
    }

    /// Same commit outcome and undo history; placement is ignored
    pub fn equals(&self, other: &TxData) -> bool {
        let lhs = &self.commit;
        let rhs = &other.commit;
        lhs.tx_id == rhs.tx_id
            && lhs.state == rhs.state
            && lhs.commit_version == rhs.commit_version
            && lhs.start_scn == rhs.start_scn
            && lhs.end_scn == rhs.end_scn
            && self.undo_status_list.equals(&other.undo_status_list)
    }

    /// Reset the commit outcome and return the undo history to the slab
    pub fn reset(&mut self) {
        self.commit.reset();
        self.undo_status_list.reset();
    }

    /// Human-readable dump for diagnostics
    pub fn dump_to_text<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "TX_ID={}, STATE={}, COMMIT_VERSION={}, START_SCN={}, END_SCN={}, IN_VERSION_STORE={}",
            self.commit.tx_id,
            self.commit.state,
            self.commit.commit_version,
            self.commit.start_scn,
            self.commit.end_scn,
            self.commit.in_version_store
        )?;
        self.undo_status_list.dump_to_text(out)?;
        writeln!(out)
    }
}

impl Deref for TxData {
    type Target = TxCommitData;

    fn deref(&self) -> &TxCommitData {
        &self.commit
    }
}

impl DerefMut for TxData {
    fn deref_mut(&mut self) -> &mut TxCommitData {
        &mut self.commit
    }
}

impl Encode for TxData {
    fn encoded_len(&self) -> usize {
        self.get_serialize_size()
    }

    fn encode(&self, w: &mut Writer<'_>) -> Result<()> {
        self.serialize(w)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        // Appends may land between two guards; size and encode under one
        let chain = self.undo_status_list.read_chain();
        let mut buf = vec![0u8; envelope_len(self.commit.payload_len() + chain.encoded_len())];
        let mut w = Writer::new(&mut buf)?;
        self.encode_with(&chain, &mut w)?;
        Ok(buf)
    }
}

impl fmt::Display for TxData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{commit:{}, undo_status_list:{}}}",
            self.commit, self.undo_status_list
        )
    }
}

impl fmt::Debug for TxData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxData")
            .field("commit", &self.commit)
            .field("undo_status_list", &self.undo_status_list)
            .finish()
    }
}
