use super::arena::Arena;
use super::skip_list::{Iter, SkipList, Splice};
use crate::config::MemTableConfig;
use log::debug;
use plumedb_core::{Key, Result, Value};
use std::sync::Arc;

/// In-memory ordered index for recent writes
///
/// The MemTable is the write-optimized frontend of a storage engine: it
/// accepts concurrent inserts from many threads and serves point lookups
/// over an arena-backed skip list. Keys are unique; the first insert of a
/// key wins and later inserts of the same key are rejected.
///
/// The arena is sized at construction and never grows. When it runs out,
/// inserts fail with [`plumedb_core::Error::ArenaExhausted`] and the
/// MemTable should be swapped for a fresh one. Dropping the MemTable
/// releases every entry at once.
///
/// # Thread Safety
///
/// Inserts are lock-free and may run from any number of threads. Lookups
/// never observe a partially built entry, but a lookup racing a writer may
/// miss a key it has already passed; readers that need a complete view
/// should run after writers have finished.
///
/// # Example
///
/// ```
/// use plumedb_storage::{MemTable, MemTableConfig};
///
/// let memtable = MemTable::new(MemTableConfig::default())?;
///
/// assert!(memtable.insert(7, 70)?);
/// assert!(!memtable.insert(7, 71)?); // duplicate
/// assert_eq!(memtable.get(7), Some(70));
/// # Ok::<(), plumedb_core::Error>(())
/// ```
pub struct MemTable {
    arena: Arc<Arena>,
    list: SkipList,
}

impl MemTable {
    /// Creates a MemTable with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of range.
    pub fn new(config: MemTableConfig) -> Result<Self> {
        config.validate()?;
        let arena = Arc::new(Arena::new(config.arena_capacity)?);
        let list = SkipList::new(Arc::clone(&arena), &config)?;
        debug!(
            "memtable created: arena_capacity={} max_height={}",
            config.arena_capacity, config.max_height
        );
        Ok(Self { arena, list })
    }

    /// Inserts a key-value pair
    ///
    /// Returns `Ok(false)` if the key is already present; the existing
    /// value is kept.
    ///
    /// # Errors
    ///
    /// Returns [`plumedb_core::Error::ArenaExhausted`] when the arena has
    /// no room for the entry.
    pub fn insert(&self, key: Key, value: Value) -> Result<bool> {
        let handle = self.list.allocate(key, value)?;
        Ok(self.list.insert_concurrently(handle))
    }

    /// Retrieves the value for a key
    pub fn get(&self, key: Key) -> Option<Value> {
        self.list.search(key).map(|h| h.value())
    }

    /// Creates a writer that caches its insertion point across calls
    ///
    /// Each writer owns a private splice cursor, so a thread inserting
    /// runs of ascending keys skips most of the top-down search work. Use
    /// one writer per thread; the cursor must not be shared.
    pub fn writer(&self) -> MemTableWriter<'_> {
        MemTableWriter {
            list: &self.list,
            hint: None,
        }
    }

    /// Iterates all entries in ascending key order
    pub fn iter(&self) -> Iter<'_> {
        self.list.iter()
    }

    /// Number of entries in the MemTable
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns `true` if the MemTable holds no entries
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Returns the number of arena bytes consumed so far
    ///
    /// This counts allocations, including nodes whose insert was rejected
    /// as a duplicate, not live entries.
    pub fn approximate_memory_usage(&self) -> usize {
        self.arena.memory_usage()
    }
}

/// A per-thread insert handle holding a splice cursor
///
/// Created by [`MemTable::writer`]. The cursor is lazily built on the
/// first insert and repaired in place when other writers invalidate parts
/// of it.
pub struct MemTableWriter<'a> {
    list: &'a SkipList,
    hint: Option<Splice>,
}

impl MemTableWriter<'_> {
    /// Inserts a key-value pair through the cached cursor
    ///
    /// Returns `Ok(false)` if the key is already present.
    ///
    /// # Errors
    ///
    /// Returns [`plumedb_core::Error::ArenaExhausted`] when the arena has
    /// no room for the entry.
    pub fn insert(&mut self, key: Key, value: Value) -> Result<bool> {
        let handle = self.list.allocate(key, value)?;
        Ok(self.list.insert_with_hint(handle, &mut self.hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plumedb_core::Error;

    #[test]
    fn test_memtable_basic() {
        let memtable = MemTable::new(MemTableConfig::default()).unwrap();

        assert!(memtable.is_empty());
        assert!(memtable.insert(1, 10).unwrap());
        assert!(memtable.insert(2, 20).unwrap());
        assert!(memtable.insert(3, 30).unwrap());

        assert_eq!(memtable.len(), 3);
        assert_eq!(memtable.get(2), Some(20));
        assert_eq!(memtable.get(4), None);
        assert!(memtable.approximate_memory_usage() > 0);
    }

    #[test]
    fn test_insert_then_get_round_trip() {
        let memtable = MemTable::new(MemTableConfig::default()).unwrap();

        for key in -50..50 {
            assert!(memtable.insert(key, key * 2).unwrap());
        }
        for key in -50..50 {
            assert_eq!(memtable.get(key), Some(key * 2));
        }
    }

    #[test]
    fn test_duplicate_keeps_first_value() {
        let memtable = MemTable::new(MemTableConfig::default()).unwrap();

        assert!(memtable.insert(42, 1).unwrap());
        assert!(!memtable.insert(42, 2).unwrap());

        assert_eq!(memtable.get(42), Some(1));
        assert_eq!(memtable.len(), 1);
    }

    #[test]
    fn test_writer_hinted_inserts() {
        let memtable = MemTable::new(MemTableConfig::default()).unwrap();
        let mut writer = memtable.writer();

        for key in 0..500 {
            assert!(writer.insert(key, key).unwrap());
        }
        assert!(!writer.insert(250, 0).unwrap());

        let keys: Vec<i32> = memtable.iter().map(|kv| kv.key).collect();
        assert_eq!(keys, (0..500).collect::<Vec<_>>());
        assert_eq!(memtable.get(250), Some(250));
    }

    #[test]
    fn test_iter_is_sorted_for_unordered_inserts() {
        let memtable = MemTable::new(MemTableConfig::default()).unwrap();

        for key in [9, 1, 8, 2, 7, 3, 6, 4, 5] {
            assert!(memtable.insert(key, 0).unwrap());
        }

        let keys: Vec<i32> = memtable.iter().map(|kv| kv.key).collect();
        assert_eq!(keys, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn test_exhausted_arena_rejects_inserts() {
        let config = MemTableConfig {
            arena_capacity: 1024,
            ..Default::default()
        };
        let memtable = MemTable::new(config).unwrap();

        let mut last = Ok(true);
        for key in 0..1000 {
            last = memtable.insert(key, key);
            if last.is_err() {
                break;
            }
        }
        assert!(matches!(last, Err(Error::ArenaExhausted { .. })));

        // Earlier entries remain readable.
        assert_eq!(memtable.get(0), Some(0));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = MemTableConfig {
            max_height: 0,
            ..Default::default()
        };
        assert!(matches!(
            MemTable::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }
}
