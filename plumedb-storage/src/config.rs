//! Configuration for the memtable index

use plumedb_core::{Error, Result};

/// Hard upper bound on the height of any skip list tower
///
/// `MemTableConfig::max_height` may be configured anywhere up to this
/// ceiling. Splice cursors are sized against the configured height, not
/// this constant.
pub const MAX_POSSIBLE_HEIGHT: usize = 32;

/// Configuration options for a memtable index
///
/// This struct contains all tunable parameters for the arena-backed skip
/// list: the tower height ceiling, the branching factor that shapes the
/// height distribution, and the arena capacity that bounds total memory.
///
/// # Example
///
/// ```
/// use plumedb_storage::MemTableConfig;
///
/// let config = MemTableConfig {
///     arena_capacity: 4 * 1024 * 1024, // 4MB
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct MemTableConfig {
    /// Maximum number of forward-pointer levels a node may occupy
    pub max_height: usize,

    /// Inverse probability of a node growing one more level
    ///
    /// With the default of 4, a node has a 1-in-4 chance of reaching each
    /// additional level, which keeps expected search cost logarithmic.
    pub branching_factor: u32,

    /// Size of the arena backing all node allocations (in bytes)
    ///
    /// The arena is allocated up front and never grows. Once it is
    /// exhausted, inserts fail and the index must be replaced.
    pub arena_capacity: usize,
}

impl Default for MemTableConfig {
    fn default() -> Self {
        Self {
            max_height: 12,
            branching_factor: 4,
            arena_capacity: 1 << 25, // 32MB
        }
    }
}

impl MemTableConfig {
    /// Checks that all parameters are within their supported ranges
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_height == 0 || self.max_height > MAX_POSSIBLE_HEIGHT {
            return Err(Error::InvalidConfig(format!(
                "max_height must be in [1, {}], got {}",
                MAX_POSSIBLE_HEIGHT, self.max_height
            )));
        }
        if self.branching_factor < 2 {
            return Err(Error::InvalidConfig(format!(
                "branching_factor must be at least 2, got {}",
                self.branching_factor
            )));
        }
        if self.arena_capacity == 0 {
            return Err(Error::InvalidConfig(
                "arena_capacity must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}
