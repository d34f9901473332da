//! PlumeDB: a concurrent in-memory ordered index
//!
//! PlumeDB maps integer keys to integer values through an arena-backed,
//! lock-free skip list, built to sit in front of a storage engine as its
//! write buffer. This facade crate re-exports the public surface of the
//! workspace members:
//!
//! - [`plumedb_core`]: shared types and errors
//! - [`plumedb_storage`]: the MemTable, skip list, and arena
//!
//! # Example
//!
//! ```
//! use plumedb::{MemTable, MemTableConfig};
//!
//! let memtable = MemTable::new(MemTableConfig::default())?;
//!
//! memtable.insert(2, 20)?;
//! memtable.insert(1, 10)?;
//! assert_eq!(memtable.get(1), Some(10));
//!
//! let keys: Vec<i32> = memtable.iter().map(|kv| kv.key).collect();
//! assert_eq!(keys, vec![1, 2]);
//! # Ok::<(), plumedb::Error>(())
//! ```

pub use plumedb_core::{Error, Key, KeyValue, Result, Value};
pub use plumedb_storage::{MemTable, MemTableConfig, MemTableWriter};
