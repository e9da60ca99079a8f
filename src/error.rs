//! Error kinds for sequence operations.
//!
//! There are no transient errors here: every operation is a deterministic
//! in-memory transform. Bounds and precondition violations surface
//! immediately at the offending call; broken internal invariants are bugs
//! and are caught by `debug_assert!` / `verify`, never returned.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SeqError {
    /// An index outside `[0, len)` (or `[0, len]` for insertion).
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A finger was used after the structure changed underneath it.
    #[error("finger no longer points at a live slot")]
    StaleFinger,

    /// An element id that is no longer attached to the sequence.
    #[error("element is no longer attached to the sequence")]
    Detached,
}
