//! Convenient imports for txdata.
//!
//! ```
//! use txdata::prelude::*;
//!
//! let store = TxDataStore::open(TxDataConfig::default())?;
//! # Ok::<(), txdata::Error>(())
//! ```

// Main entry point
pub use crate::store::{TxDataStore, TxDataStoreBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Core types
pub use txdata_core::{Scn, SequenceNo, TxDataConfig, TxId, TxState, UndoAction};

// Records
pub use txdata_storage::{TxCommitData, TxData, UndoStatusList};

// Codec, for to_bytes() and deserialize() on records
pub use txdata_core::{Decode, Encode, Reader, Writer};
