//! flowcap: flow record capture streams and a rule-based record filter.
//!
//! - [`stream`] reads and writes capture files: a versioned header followed
//!   by fixed-size records, raw or as one zlib stream.
//! - [`header`] encodes and decodes the header (legacy format 1, TLV
//!   format 3).
//! - [`record`] knows every record layout and the fields it carries.
//! - [`filter`] loads filter files and evaluates records against them.

pub mod error;
pub mod filter;
pub mod header;
pub mod record;
pub mod stream;

pub use error::{FlowError, Result};
pub use filter::{Definition, Evaluator, FilterSet, LoadContext, Verdict};
pub use header::{ByteOrder, StreamHeader};
pub use record::{Field, FieldOffsets, RecordVersion};
pub use stream::{ReadOptions, StreamConfig, StreamReader, StreamWriter, WriteOptions};
