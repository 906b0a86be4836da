//! Configuration for the transaction data store.
//!
//! Use the builder methods or load from TOML:
//!
//! ```
//! use txdata_core::TxDataConfig;
//!
//! let config = TxDataConfig::new().slab_capacity(4096);
//! assert_eq!(config.slab_capacity, Some(4096));
//!
//! let config = TxDataConfig::from_toml_str("max_tx_serialize_size = 65536").unwrap();
//! assert_eq!(config.max_tx_serialize_size, 65536);
//! assert_eq!(config.slice_size, 128);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default size of one slab slice in bytes
pub const DEFAULT_SLICE_SIZE: usize = 128;

/// Default ceiling for the serialized footprint of one record
pub const DEFAULT_MAX_TX_SERIALIZE_SIZE: usize = 1_572_864;

/// Store-wide configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxDataConfig {
    /// Bytes accounted per undo node
    pub slice_size: usize,
    /// Soft cap on `node_count * slice_size` for one undo status list
    pub max_tx_serialize_size: usize,
    /// Maximum slots the shared slab hands out; `None` means unbounded
    pub slab_capacity: Option<usize>,
}

impl Default for TxDataConfig {
    fn default() -> Self {
        Self {
            slice_size: DEFAULT_SLICE_SIZE,
            max_tx_serialize_size: DEFAULT_MAX_TX_SERIALIZE_SIZE,
            slab_capacity: None,
        }
    }
}

impl TxDataConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-node slice size
    pub fn slice_size(mut self, bytes: usize) -> Self {
        self.slice_size = bytes;
        self
    }

    /// Set the serialize-size ceiling
    pub fn max_tx_serialize_size(mut self, bytes: usize) -> Self {
        self.max_tx_serialize_size = bytes;
        self
    }

    /// Bound the shared slab
    pub fn slab_capacity(mut self, slots: usize) -> Self {
        self.slab_capacity = Some(slots);
        self
    }

    /// Parse from TOML; absent fields keep their defaults
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: TxDataConfig =
            toml::from_str(input).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every limit is usable
    pub fn validate(&self) -> Result<()> {
        if self.slice_size == 0 {
            return Err(Error::Config("slice_size must be non-zero".to_string()));
        }
        if self.max_tx_serialize_size == 0 {
            return Err(Error::Config(
                "max_tx_serialize_size must be non-zero".to_string(),
            ));
        }
        if self.slab_capacity == Some(0) {
            return Err(Error::Config("slab_capacity must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Limits handed to every undo status list
    pub fn undo_limits(&self) -> UndoLimits {
        UndoLimits {
            slice_size: self.slice_size,
            max_tx_serialize_size: self.max_tx_serialize_size,
        }
    }
}

/// Size limits enforced by an undo status list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoLimits {
    /// Bytes accounted per undo node
    pub slice_size: usize,
    /// Soft cap on `node_count * slice_size`
    pub max_tx_serialize_size: usize,
}

impl UndoLimits {
    /// Accounted footprint of `node_count` nodes
    pub fn footprint(&self, node_count: usize) -> usize {
        node_count.saturating_mul(self.slice_size)
    }

    /// Whether `node_count` nodes exceed the cap
    pub fn is_overflow(&self, node_count: usize) -> bool {
        self.footprint(node_count) > self.max_tx_serialize_size
    }
}

impl Default for UndoLimits {
    fn default() -> Self {
        TxDataConfig::default().undo_limits()
    }
}
