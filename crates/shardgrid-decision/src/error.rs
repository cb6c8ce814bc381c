//! Error types for decoding allocation explain records.

use thiserror::Error;

/// Result type alias for decision codec operations.
pub type DecisionResult<T> = Result<T, DecisionError>;

/// Errors surfaced while reading an explain record off the wire.
///
/// Construction of decisions never fails; every variant here describes
/// malformed input.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("truncated stream: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid boolean byte: 0x{0:02x}")]
    InvalidBool(u8),

    #[error("unknown {kind} ordinal: {ordinal}")]
    UnknownOrdinal { kind: &'static str, ordinal: u8 },

    #[error("variable-length integer overflows {bits} bits")]
    VarIntOverflow { bits: u32 },

    #[error("invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("bad frame magic: {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("unsupported wire version: {0}")]
    UnsupportedVersion(u16),

    #[error("frame length mismatch: header says {declared} bytes, body has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    #[error("decision nesting exceeds {limit} levels")]
    NestingTooDeep { limit: usize },

    #[error("invalid shard allocation decision: {0}")]
    InvalidState(String),
}
