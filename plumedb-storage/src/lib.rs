//! Storage frontend for PlumeDB
//!
//! This crate implements the write-optimized, in-memory half of an LSM
//! storage engine:
//!
//! - **MemTable**: concurrent ordered index over integer keys and values
//! - **Skip list**: lock-free, variable-height linked structure with
//!   per-level compare-and-swap insertion and splice-cursor hints
//! - **Arena**: fixed-size bump allocator that owns all node memory
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! writers ──allocate──▶ Arena ──handle──▶ SkipList (per-level CAS links)
//!
//! Read Path:
//! reader ──▶ SkipList (top-down descent) ──▶ value
//! ```
//!
//! # Example
//!
//! ```
//! use plumedb_storage::{MemTable, MemTableConfig};
//!
//! let memtable = MemTable::new(MemTableConfig::default())?;
//! memtable.insert(1, 100)?;
//! assert_eq!(memtable.get(1), Some(100));
//! # Ok::<(), plumedb_core::Error>(())
//! ```

pub mod config;
pub mod memtable;

pub use config::MemTableConfig;
pub use memtable::{MemTable, MemTableWriter};
