//! Error types for PlumeDB
//!
//! This module defines the error types used throughout PlumeDB.

use thiserror::Error;

/// The main error type for PlumeDB operations
#[derive(Error, Debug)]
pub enum Error {
    /// The arena backing an index has no room for another allocation.
    ///
    /// The arena never recovers from this condition: its offset only moves
    /// forward, so once an allocation fails every later allocation of the
    /// same size fails too. Callers should treat the index as full and
    /// discard or replace it.
    #[error("arena exhausted: requested {requested} bytes with {remaining} of {capacity} remaining")]
    ArenaExhausted {
        /// Size of the allocation that did not fit, after alignment
        requested: usize,
        /// Bytes still unallocated when the request was made
        remaining: usize,
        /// Total capacity of the arena
        capacity: usize,
    },

    /// A configuration value was out of range at construction time
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A specialized Result type for PlumeDB operations
pub type Result<T> = std::result::Result<T, Error>;
