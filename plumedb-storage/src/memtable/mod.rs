//! In-memory ordered index built on an arena-backed skip list
//!
//! The MemTable is an in-memory write buffer mapping integer keys to
//! integer values. It is built from two tightly coupled pieces:
//!
//! - An [`Arena`] that bump-allocates every node from one fixed buffer
//! - A lock-free [`SkipList`] whose per-level links are published with
//!   compare-and-swap, with splice cursors to make ordered insert runs
//!   cheap
//!
//! Entries are never deleted; the arena, the list, and every handle into
//! it are discarded together.
//!
//! # Example
//!
//! ```
//! use plumedb_storage::{MemTable, MemTableConfig};
//!
//! let memtable = MemTable::new(MemTableConfig::default())?;
//!
//! memtable.insert(3, 30)?;
//! memtable.insert(1, 10)?;
//!
//! let keys: Vec<i32> = memtable.iter().map(|kv| kv.key).collect();
//! assert_eq!(keys, vec![1, 3]);
//! # Ok::<(), plumedb_core::Error>(())
//! ```

mod arena;
mod memtable;
mod skip_list;

pub use arena::Arena;
pub use memtable::{MemTable, MemTableWriter};
pub use skip_list::{Iter, NodeHandle, SkipList, Splice};
