//! Core types for txdata
//!
//! This crate defines the building blocks shared by the storage and
//! concurrency layers:
//! - [`TxId`], [`Scn`], [`SequenceNo`]: transaction identity and logical time
//! - [`TxState`]: commit lifecycle of a transaction
//! - [`UndoAction`]: a rolled-back sequence-number interval
//! - [`codec`]: varint encoding and the versioned envelope
//! - [`Error`]: the error taxonomy used across the workspace
//! - [`TxDataConfig`]: sizing limits and slab configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod error;
pub mod types;
pub mod undo;

pub use codec::{Decode, Encode, Reader, Writer, UNIS_VERSION};
pub use config::{TxDataConfig, UndoLimits};
pub use error::{Error, Result};
pub use types::{Scn, SequenceNo, TxId, TxState};
pub use undo::UndoAction;
