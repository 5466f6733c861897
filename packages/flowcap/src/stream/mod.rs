//! Stream engine: one open capture file, read or write side.
//!
//! ```text
//! ┌──────────────┬───────────────────────────────────────────┐
//! │ header       │ records (raw, or one zlib deflate stream) │
//! └──────────────┴───────────────────────────────────────────┘
//! ```
//!
//! Readers hand out records in host byte order; writers swap to the header's
//! byte order on the way out and restore the caller's bytes afterwards.

mod sink;
mod source;

pub use sink::StreamWriter;
pub use source::StreamReader;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Compressed staging buffer size (both directions).
pub const Z_BUFSIZE: usize = 16384;

/// Uncompressed staging buffer size.
pub const D_BUFSIZE: usize = 32768;

/// Default zlib level for compressed writers.
pub const DEFAULT_Z_LEVEL: u32 = 9;

// ── Options ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReadOptions {
    /// Map the whole file instead of reading through staging buffers.
    pub mmap: bool,
    /// Hand out records in stream byte order.
    pub no_swap: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WriteOptions {
    pub compress: bool,
    /// zlib level, 0..=9.
    pub z_level: u32,
    /// Caller manages header byte order and record bytes.
    pub no_swap: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compress: false,
            z_level: DEFAULT_Z_LEVEL,
            no_swap: false,
        }
    }
}

// ── Config file ────────────────────────────────────────────────────

/// Stream options as loaded from a JSON config file.
///
/// ```json
/// { "read": { "mmap": true }, "write": { "compress": true, "z_level": 6 } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    pub read: ReadOptions,
    pub write: WriteOptions,
}

impl StreamConfig {
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
