//! Lock-free skip list for the MemTable
//!
//! This module implements a concurrent, forward-only skip list whose nodes
//! live in a fixed-size [`Arena`]. It supports:
//!
//! - Concurrent insertion from many writers via per-level compare-and-swap
//! - Splice cursors that amortize the search cost of repeated ordered inserts
//! - A partial-splice-fix heuristic that repairs individually stale cursor
//!   levels instead of discarding the whole cursor
//! - Single-reader point lookup and forward traversal
//!
//! Entries are never removed. Node memory is reclaimed only when the arena
//! backing the list is dropped, so the list and its arena share one
//! lifetime.

use crate::config::MemTableConfig;
use crate::memtable::arena::Arena;
use crossbeam::utils::CachePadded;
use log::debug;
use parking_lot::Mutex;
use plumedb_core::{Key, KeyValue, Result, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

/// Height samples are drawn uniformly from `[0, 1 << 30)`; a node grows a
/// level while its sample falls below `RANDOM_SAMPLE_RANGE / branching`.
const RANDOM_SAMPLE_RANGE: u32 = 1 << 30;

/// A node in the skip list
///
/// Nodes are variable-sized records written directly into the arena: a
/// fixed `#[repr(C)]` header followed by `height` atomic forward pointers.
/// The tail is addressed through the zero-length `tower` marker field.
/// Key, value, and height are immutable once the node is built; only the
/// tower slots change afterwards.
#[repr(C)]
struct Node {
    key: Key,
    value: Value,
    height: u32,
    tower: [AtomicPtr<Node>; 0],
}

impl Node {
    /// Bytes needed in the arena for a node of the given height
    fn size_for(height: usize) -> usize {
        mem::offset_of!(Node, tower) + height * mem::size_of::<AtomicPtr<Node>>()
    }

    /// Writes a node header plus `height` null tower slots into `region`
    ///
    /// # Safety
    ///
    /// `region` must be pointer-aligned, at least [`Node::size_for`]
    /// `(height)` bytes long, and not shared with any other node.
    unsafe fn init(region: NonNull<u8>, key: Key, value: Value, height: usize) -> *mut Node {
        let node = region.as_ptr().cast::<Node>();
        ptr::write(
            node,
            Node {
                key,
                value,
                height: height as u32,
                tower: [],
            },
        );
        for level in 0..height {
            Self::tower(node, level).write(AtomicPtr::new(ptr::null_mut()));
        }
        node
    }

    /// # Safety
    ///
    /// `node` must point at an initialized node and `level` must be below
    /// its height.
    unsafe fn tower(node: *mut Node, level: usize) -> *mut AtomicPtr<Node> {
        debug_assert!(level < (*node).height as usize);
        node.cast::<u8>()
            .add(mem::offset_of!(Node, tower))
            .cast::<AtomicPtr<Node>>()
            .add(level)
    }

    /// # Safety
    ///
    /// Same contract as [`Node::tower`].
    unsafe fn next(node: *mut Node, level: usize) -> *mut Node {
        (*Self::tower(node, level)).load(Ordering::Acquire)
    }

    /// Pre-publication store. The node is not reachable yet, so ordering
    /// is provided by the CAS that later publishes it.
    ///
    /// # Safety
    ///
    /// Same contract as [`Node::tower`]; the node must not be linked into
    /// the list at this level yet.
    unsafe fn set_next_relaxed(node: *mut Node, level: usize, next: *mut Node) {
        (*Self::tower(node, level)).store(next, Ordering::Relaxed);
    }

    /// Strong compare-and-swap on one forward pointer
    ///
    /// # Safety
    ///
    /// Same contract as [`Node::tower`].
    unsafe fn cas_next(node: *mut Node, level: usize, expected: *mut Node, new: *mut Node) -> bool {
        (*Self::tower(node, level))
            .compare_exchange(expected, new, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }
}

/// True when `key` orders strictly after the node's key
///
/// A null node acts as positive infinity, so nothing is after it.
///
/// # Safety
///
/// `node` must be null or point at an initialized node.
unsafe fn key_is_after_node(key: Key, node: *mut Node) -> bool {
    !node.is_null() && (*node).key < key
}

/// True when `key` orders strictly before the node's key
///
/// # Safety
///
/// `node` must be null or point at an initialized node.
unsafe fn key_is_before_node(key: Key, node: *mut Node) -> bool {
    node.is_null() || key < (*node).key
}

/// An opaque reference to an allocated entry
///
/// Handles are produced by [`SkipList::allocate`] and consumed by the
/// insert operations. They stay valid for reads as long as the arena that
/// owns the node is alive, even if the insert was rejected as a duplicate.
#[derive(Clone, Copy, Debug)]
pub struct NodeHandle {
    node: NonNull<Node>,
}

impl NodeHandle {
    /// Returns the key stored in the entry
    pub fn key(&self) -> Key {
        // SAFETY: the handle was created from an initialized, arena-owned
        // node, and the key field is immutable.
        unsafe { self.node.as_ref().key }
    }

    /// Returns the value stored in the entry
    pub fn value(&self) -> Value {
        // SAFETY: as for `key`.
        unsafe { self.node.as_ref().value }
    }

    fn as_ptr(&self) -> *mut Node {
        self.node.as_ptr()
    }
}

// SAFETY: a handle only reads immutable fields of an arena-owned node.
unsafe impl Send for NodeHandle {}
unsafe impl Sync for NodeHandle {}

/// A per-writer cursor caching the most recent insertion point
///
/// The cursor records, for every level up to `height`, the predecessor and
/// successor that bounded the last insert. The next hinted insert
/// re-validates these windows instead of searching from the top, which
/// makes runs of ascending keys cheap.
///
/// A splice belongs to exactly one writer and must only be used with the
/// list that allocated it.
pub struct Splice {
    /// Levels `[0, height)` hold windows that were valid at some earlier
    /// point; zero means the cursor carries no usable state.
    height: usize,
    prev: Box<[*mut Node]>,
    next: Box<[*mut Node]>,
}

impl Splice {
    fn new(max_height: usize) -> Self {
        Self {
            height: 0,
            prev: vec![ptr::null_mut(); max_height + 1].into_boxed_slice(),
            next: vec![ptr::null_mut(); max_height + 1].into_boxed_slice(),
        }
    }
}

// SAFETY: a splice is owned by one writer at a time; the pointers it holds
// are only dereferenced by list operations on the owning thread.
unsafe impl Send for Splice {}

/// A concurrent skip list mapping `i32` keys to `i32` values
///
/// # Thread Safety
///
/// Any number of threads may insert concurrently; every link is published
/// with a single-word compare-and-swap, and losers re-scan forward from a
/// still-valid left bound. Lookups are safe against torn nodes (a node is
/// fully built before it becomes reachable) but may miss keys inserted
/// concurrently behind the reader's position. Readers that need a complete
/// view should run after writers have quiesced.
///
/// # Memory Management
///
/// All nodes are bump-allocated from the [`Arena`] passed at construction.
/// Nothing is freed per entry; dropping the arena releases every node at
/// once, so handles must not outlive it.
pub struct SkipList {
    arena: Arc<Arena>,
    /// Sentinel of maximal height; its key is never compared.
    head: *mut Node,
    /// Highest level occupied by any inserted node. Monotonic.
    max_height: CachePadded<AtomicUsize>,
    entries: AtomicUsize,
    height_cap: usize,
    scaled_inverse_branching: u32,
    rng: Mutex<StdRng>,
}

impl SkipList {
    /// Creates an empty skip list whose nodes live in `arena`
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of range or the arena
    /// cannot hold the head sentinel.
    pub fn new(arena: Arc<Arena>, config: &MemTableConfig) -> Result<Self> {
        config.validate()?;
        let head = Self::allocate_node(&arena, 0, 0, config.max_height)?;
        debug!(
            "skip list created: max_height={} branching_factor={} arena_capacity={}",
            config.max_height,
            config.branching_factor,
            arena.capacity()
        );
        Ok(Self {
            arena,
            head,
            max_height: CachePadded::new(AtomicUsize::new(1)),
            entries: AtomicUsize::new(0),
            height_cap: config.max_height,
            scaled_inverse_branching: RANDOM_SAMPLE_RANGE / config.branching_factor,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Allocates an entry with a randomly drawn height
    ///
    /// The returned handle is not yet part of the list; pass it to one of
    /// the insert operations to link it. A handle whose insert is rejected
    /// stays allocated until the arena is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`plumedb_core::Error::ArenaExhausted`] when the arena has
    /// no room for the node.
    pub fn allocate(&self, key: Key, value: Value) -> Result<NodeHandle> {
        let height = self.random_height();
        self.allocate_with_height(key, value, height)
    }

    pub(crate) fn allocate_with_height(
        &self,
        key: Key,
        value: Value,
        height: usize,
    ) -> Result<NodeHandle> {
        debug_assert!(height >= 1 && height <= self.height_cap);
        let node = Self::allocate_node(&self.arena, key, value, height)?;
        // SAFETY: allocate_node never returns null.
        Ok(NodeHandle {
            node: unsafe { NonNull::new_unchecked(node) },
        })
    }

    fn allocate_node(arena: &Arena, key: Key, value: Value, height: usize) -> Result<*mut Node> {
        let region = arena.alloc(Node::size_for(height))?;
        // SAFETY: the region is pointer-aligned, sized for the header plus
        // `height` tower slots, and exclusively ours until published.
        Ok(unsafe { Node::init(region, key, value, height) })
    }

    /// Creates a cursor sized for this list
    pub fn allocate_splice(&self) -> Splice {
        Splice::new(self.height_cap)
    }

    /// Draws a height from the geometric distribution
    ///
    /// Starts at 1 and keeps growing while a fresh uniform sample lands
    /// below `1/branching_factor` of the sample range.
    fn random_height(&self) -> usize {
        let mut height = 1;
        let mut rng = self.rng.lock();
        while height < self.height_cap
            && rng.gen_range(0..RANDOM_SAMPLE_RANGE) < self.scaled_inverse_branching
        {
            height += 1;
        }
        height
    }

    /// Highest level currently occupied by any node
    pub fn max_height(&self) -> usize {
        self.max_height.load(Ordering::Relaxed)
    }

    /// Number of successfully inserted entries
    pub fn len(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    /// Returns `true` if no entry has been inserted yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts an allocated entry using a one-shot cursor
    ///
    /// Returns `false` if the key is already present; the list is left
    /// unchanged in that case.
    pub fn insert_concurrently(&self, node: NodeHandle) -> bool {
        let mut splice = self.allocate_splice();
        self.insert(node, &mut splice, false)
    }

    /// Inserts an allocated entry, reusing a caller-owned cursor
    ///
    /// The cursor is created lazily on the first call and remains owned by
    /// the caller, which makes runs of ascending keys from one writer
    /// nearly search-free. Stale cursor levels are repaired individually
    /// rather than discarding the whole cursor.
    pub fn insert_with_hint(&self, node: NodeHandle, hint: &mut Option<Splice>) -> bool {
        let splice = hint.get_or_insert_with(|| self.allocate_splice());
        self.insert(node, splice, true)
    }

    /// Links an allocated entry into every level it occupies
    ///
    /// `splice` is validated against the current state of the list and
    /// recomputed where stale; `allow_partial_splice_fix` selects between
    /// repairing individual levels and recomputing wholesale. Returns
    /// `false` if the key is already present.
    pub fn insert(&self, node: NodeHandle, splice: &mut Splice, allow_partial_splice_fix: bool) -> bool {
        let x = node.as_ptr();
        // SAFETY: the handle points at an initialized node whose key,
        // value, and height are immutable.
        let (key, height) = unsafe { ((*x).key, (*x).height as usize) };
        debug_assert!(height >= 1 && height <= self.height_cap);
        debug_assert_eq!(splice.prev.len(), self.height_cap + 1);

        let mut max_height = self.max_height.load(Ordering::Relaxed);
        while height > max_height {
            match self.max_height.compare_exchange_weak(
                max_height,
                height,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    max_height = height;
                    break;
                }
                Err(actual) => max_height = actual,
            }
        }
        debug_assert!(max_height <= self.height_cap);

        let mut recompute_height = 0;
        if splice.height < max_height {
            // The list has grown above the cursor since it was cached, so
            // nothing in it can be trusted. Seed the top window with the
            // full list and recompute everything below.
            splice.prev[max_height] = self.head;
            splice.next[max_height] = ptr::null_mut();
            splice.height = max_height;
            recompute_height = max_height;
        } else {
            // Scan bottom-up for the first level whose cached window is
            // still intact; everything below it must be recomputed.
            while recompute_height < max_height {
                // SAFETY: levels below `splice.height` hold nodes observed
                // in this list; nodes are never freed while the arena lives.
                unsafe {
                    if Node::next(splice.prev[recompute_height], recompute_height)
                        != splice.next[recompute_height]
                    {
                        // The link was spliced by a concurrent writer.
                        recompute_height += 1;
                    } else if splice.prev[recompute_height] != self.head
                        && !key_is_after_node(key, splice.prev[recompute_height])
                    {
                        // Cached predecessor is at or past the key.
                        if allow_partial_splice_fix {
                            let bad = splice.prev[recompute_height];
                            while splice.prev[recompute_height] == bad {
                                recompute_height += 1;
                            }
                        } else {
                            recompute_height = max_height;
                        }
                    } else if key_is_after_node(key, splice.next[recompute_height]) {
                        // Cached successor is before the key.
                        if allow_partial_splice_fix {
                            let bad = splice.next[recompute_height];
                            while splice.next[recompute_height] == bad {
                                recompute_height += 1;
                            }
                        } else {
                            recompute_height = max_height;
                        }
                    } else {
                        break;
                    }
                }
            }
        }
        if recompute_height > 0 {
            self.recompute_splice_levels(key, splice, recompute_height);
        }

        let mut splice_is_valid = true;
        for level in 0..height {
            loop {
                // SAFETY: splice windows at this point bound the key with
                // live nodes of sufficient height; `x` is unpublished at
                // this level until the CAS succeeds.
                unsafe {
                    if level == 0 {
                        // The window may have collapsed around an equal key
                        // after a CAS failure, so re-check on every retry.
                        if splice.prev[0] != self.head && !key_is_after_node(key, splice.prev[0]) {
                            return false;
                        }
                        if !key_is_before_node(key, splice.next[0]) {
                            return false;
                        }
                    }
                    Node::set_next_relaxed(x, level, splice.next[level]);
                    if Node::cas_next(splice.prev[level], level, splice.next[level], x) {
                        break;
                    }
                    // Lost the race. The cached predecessor is still a
                    // valid left bound because links only move forward;
                    // re-scan from it with an unknown right bound.
                    let (prev, next) =
                        self.find_splice_for_level(key, splice.prev[level], ptr::null_mut(), level);
                    splice.prev[level] = prev;
                    splice.next[level] = next;
                    if level > 0 {
                        splice_is_valid = false;
                    }
                }
            }
        }

        if splice_is_valid {
            // Every CAS took on the first try, so `x` itself is the exact
            // predecessor window for the next ascending insert.
            for level in 0..height {
                splice.prev[level] = x;
            }
        } else {
            splice.height = 0;
        }
        self.entries.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Walks forward from `before` at `level` until the window brackets `key`
    ///
    /// `after` is an exclusive right bound known to be at or past the key;
    /// pass null when no bound is known.
    fn find_splice_for_level(
        &self,
        key: Key,
        mut before: *mut Node,
        after: *mut Node,
        level: usize,
    ) -> (*mut Node, *mut Node) {
        loop {
            // SAFETY: `before` is the head or a node observed in the list,
            // both of which are live for the lifetime of the arena.
            unsafe {
                let next = Node::next(before, level);
                if next == after || !key_is_after_node(key, next) {
                    return (before, next);
                }
                before = next;
            }
        }
    }

    /// Recomputes splice windows for levels `[0, recompute_height)`
    ///
    /// Works top-down so each level's scan starts inside the validated
    /// window one level up.
    fn recompute_splice_levels(&self, key: Key, splice: &mut Splice, recompute_height: usize) {
        for level in (0..recompute_height).rev() {
            let (prev, next) =
                self.find_splice_for_level(key, splice.prev[level + 1], splice.next[level + 1], level);
            splice.prev[level] = prev;
            splice.next[level] = next;
        }
    }

    /// Returns the first node whose key is greater than or equal to `key`,
    /// or null when every key is smaller
    fn find_greater_or_equal(&self, key: Key) -> *mut Node {
        let mut node = self.head;
        let mut level = self.max_height() - 1;
        loop {
            // SAFETY: traversal only visits the head and published nodes;
            // the null check inside `key_is_after_node` runs before any
            // key comparison.
            unsafe {
                let next = Node::next(node, level);
                if key_is_after_node(key, next) {
                    node = next;
                } else if level == 0 {
                    return next;
                } else {
                    level -= 1;
                }
            }
        }
    }

    /// Point lookup
    ///
    /// Returns a handle to the entry with exactly this key, or `None` if
    /// no such entry was inserted.
    pub fn search(&self, key: Key) -> Option<NodeHandle> {
        let node = self.find_greater_or_equal(key);
        // SAFETY: non-null results of the descent are published nodes.
        if !node.is_null() && unsafe { (*node).key } == key {
            Some(NodeHandle {
                node: unsafe { NonNull::new_unchecked(node) },
            })
        } else {
            None
        }
    }

    /// Iterates the level-0 chain in ascending key order
    ///
    /// The iterator observes entries published before it reaches their
    /// position; see the type-level notes on readers racing writers.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            // SAFETY: the head sentinel is live and spans every level.
            next: unsafe { Node::next(self.head, 0) },
            _marker: PhantomData,
        }
    }
}

// SAFETY: the raw head pointer targets arena memory owned by the list's
// Arc'd arena; all cross-thread mutation goes through atomics.
unsafe impl Send for SkipList {}
unsafe impl Sync for SkipList {}

/// Forward iterator over the level-0 chain
pub struct Iter<'a> {
    next: *mut Node,
    _marker: PhantomData<&'a SkipList>,
}

impl Iterator for Iter<'_> {
    type Item = KeyValue;

    fn next(&mut self) -> Option<KeyValue> {
        if self.next.is_null() {
            return None;
        }
        // SAFETY: `next` was read from a published link and stays live
        // while the list (and so the arena) is borrowed.
        unsafe {
            let node = self.next;
            self.next = Node::next(node, 0);
            Some(KeyValue {
                key: (*node).key,
                value: (*node).value,
            })
        }
    }
}
