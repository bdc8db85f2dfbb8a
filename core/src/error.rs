//! Error kinds for the backdrop engine.
//!
//! Four kinds surface to the caller: out-of-memory (recoverable locally
//! where possible, surfaced only once nothing else can be done), disk I/O
//! (spill read/write failure, fails the affected region), programmer error
//! (asserted and fatal in debug builds, skipped where safe in release), and
//! unsupported configuration (e.g. an unknown table variant).

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BackdropError>;

#[derive(Debug, Error)]
pub enum BackdropError {
    /// Allocation failed after the low-memory recovery ladder (compression,
    /// blist sharing, disk spill) was exhausted.
    #[error("out of memory")]
    OutOfMemory,

    /// Spill file read/write failure. The affected region must be failed by
    /// the caller; a block mid-spill is left incomplete.
    #[error("spill I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A structural invariant was violated. Fatal (assert) in debug builds;
    /// in release builds the caller decides whether the operation can be
    /// skipped.
    #[error("programmer error: {0}")]
    Programmer(&'static str),

    /// A configuration the engine does not support, e.g. an unrecognised
    /// table variant passed in from outside the crate.
    #[error("unsupported configuration: {0}")]
    Unsupported(&'static str),
}
