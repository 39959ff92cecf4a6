//! Protocol error taxonomy.
//!
//! Every failure a command can produce maps to one of these variants; the
//! `Display` form always begins with the protocol tag so clients can match
//! on it without parsing the detail text. All variants are recoverable:
//! the session reports the error and awaits the next command.

use thiserror::Error;

use crate::block::BlockId;

/// Recoverable command-level error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SimError {
    /// Malformed or missing argument for an otherwise recognized command.
    #[error("BAD_ARGUMENT: {0}")]
    BadArgument(String),

    /// Command head not recognized at all.
    #[error("UNKNOWN_COMMAND: {0}")]
    UnknownCommand(String),

    /// `set allocator` with a name outside first_fit/best_fit/worst_fit.
    #[error("UNKNOWN_STRATEGY: {0}")]
    UnknownStrategy(String),

    /// Command requires an active arena but none has been initialized.
    #[error("NOT_INITIALIZED: run `init memory <n>` or `init buddy <n>` first")]
    NotInitialized,

    /// Command is valid in principle but not for the active allocator type.
    #[error("INVALID_MODE: {0}")]
    InvalidMode(String),

    /// `free` on an id that is unknown or not backing a live used block.
    #[error("INVALID_ID: no allocated block with id {0}")]
    InvalidId(BlockId),

    /// No free block (after any permitted splitting) satisfies the request.
    #[error("OUT_OF_MEMORY: no free block can satisfy {requested} bytes")]
    OutOfMemory { requested: usize },
}

impl SimError {
    /// The bare protocol tag, without detail text.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::BadArgument(_) => "BAD_ARGUMENT",
            Self::UnknownCommand(_) => "UNKNOWN_COMMAND",
            Self::UnknownStrategy(_) => "UNKNOWN_STRATEGY",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::InvalidMode(_) => "INVALID_MODE",
            Self::InvalidId(_) => "INVALID_ID",
            Self::OutOfMemory { .. } => "OUT_OF_MEMORY",
        }
    }
}
