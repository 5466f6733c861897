//! Error types for capture streams and the filter engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowError>;

#[derive(Error, Debug)]
pub enum FlowError {
    // Stream / header errors
    #[error("Unsupported stream version {0}")]
    UnsupportedStreamVersion(u8),

    #[error("Unsupported record type: export version {d_version}")]
    UnsupportedRecordType { d_version: u16 },

    #[error("Unsupported aggregation: version {agg_version}, method {agg_method}")]
    UnsupportedAggregation { agg_version: u8, agg_method: u8 },

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    #[error("Short write: expected {expected} bytes, wrote {written}")]
    ShortWrite { expected: usize, written: usize },

    #[error("Compression engine failure: {0}")]
    CompressionEngineFailure(String),

    #[error("Header size changed on rewrite: {original} -> {now} bytes")]
    HeaderSizeChanged { original: usize, now: usize },

    #[error("Header field not set: {0}")]
    MissingHeaderField(&'static str),

    #[error("Invalid record length: expected {expected} bytes, got {got}")]
    InvalidRecordLength { expected: usize, got: usize },

    // Filter errors
    #[error("{file} line {line}: Name ({name}) previously defined")]
    DuplicateName { file: String, line: usize, name: String },

    #[error("Definition {definition}: can't find primitive {name}")]
    UnresolvedPrimitive { definition: String, name: String },

    #[error("Match type {match_type} not valid for primitive {primitive}")]
    IncompatibleMatchType { match_type: String, primitive: String },

    #[error("{file} line {line}: {msg}")]
    ParseSyntaxError { file: String, line: usize, msg: String },

    #[error("{file} line {line}: Value out of range ({value})")]
    ValueOutOfRange { file: String, line: usize, value: String },

    #[error("{file} line {line}: symbol lookup for \"{symbol}\" failed")]
    SymbolLookupFailure { file: String, line: usize, symbol: String },

    #[error("Filter needs fields {need:#x} not all present in stream ({have:#x})")]
    MissingFields { need: u64, have: u64 },

    #[error("Definition {0} belongs to a different filter set")]
    ForeignDefinition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::UnsupportedStreamVersion(_) => "UNSUPPORTED_STREAM_VERSION",
            FlowError::UnsupportedRecordType { .. } => "UNSUPPORTED_RECORD_TYPE",
            FlowError::UnsupportedAggregation { .. } => "UNSUPPORTED_AGGREGATION",
            FlowError::MalformedHeader(_) => "MALFORMED_HEADER",
            FlowError::ShortRead { .. } => "SHORT_READ",
            FlowError::ShortWrite { .. } => "SHORT_WRITE",
            FlowError::CompressionEngineFailure(_) => "COMPRESSION_ENGINE_FAILURE",
            FlowError::HeaderSizeChanged { .. } => "HEADER_SIZE_CHANGED",
            FlowError::MissingHeaderField(_) => "MISSING_HEADER_FIELD",
            FlowError::InvalidRecordLength { .. } => "INVALID_RECORD_LENGTH",
            FlowError::DuplicateName { .. } => "DUPLICATE_NAME",
            FlowError::UnresolvedPrimitive { .. } => "UNRESOLVED_PRIMITIVE",
            FlowError::IncompatibleMatchType { .. } => "INCOMPATIBLE_MATCH_TYPE",
            FlowError::ParseSyntaxError { .. } => "PARSE_SYNTAX_ERROR",
            FlowError::ValueOutOfRange { .. } => "VALUE_OUT_OF_RANGE",
            FlowError::SymbolLookupFailure { .. } => "SYMBOL_LOOKUP_FAILURE",
            FlowError::MissingFields { .. } => "MISSING_FIELDS",
            FlowError::ForeignDefinition(_) => "FOREIGN_DEFINITION",
            FlowError::Io(_) => "IO_ERROR",
            FlowError::Json(_) => "JSON_ERROR",
        }
    }
}
