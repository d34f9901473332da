//! Concurrent insertion tests
//!
//! These tests drive the MemTable from many writer threads at once and
//! check the ordering, uniqueness, and no-loss guarantees after all
//! writers have joined. Readers run strictly after the writers, which is
//! the visibility model the index is designed for.

use plumedb_storage::{MemTable, MemTableConfig};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_concurrent_disjoint_ranges() {
    init_logging();
    let memtable = Arc::new(MemTable::new(MemTableConfig::default()).unwrap());
    let mut handles = vec![];

    // 8 writers, each owning a disjoint key range and a private hint.
    for thread_id in 0..8 {
        let memtable = Arc::clone(&memtable);
        handles.push(thread::spawn(move || {
            let mut writer = memtable.writer();
            for i in 0..1000 {
                let key = thread_id * 1000 + i;
                assert!(writer.insert(key, key).unwrap());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memtable.len(), 8000);
    let keys: Vec<i32> = memtable.iter().map(|kv| kv.key).collect();
    assert_eq!(keys, (0..8000).collect::<Vec<_>>());
    for key in (0..8000).step_by(97) {
        assert_eq!(memtable.get(key), Some(key));
    }
}

#[test]
fn test_concurrent_overlapping_ranges() {
    init_logging();
    let memtable = Arc::new(MemTable::new(MemTableConfig::default()).unwrap());
    let successes = Arc::new(Mutex::new(0usize));
    let mut handles = vec![];

    // Thread i inserts [100 * i, 100 * (i + 4)], so every range overlaps
    // its four neighbors and contended keys see racing duplicate inserts.
    for thread_id in 0..16i32 {
        let memtable = Arc::clone(&memtable);
        let successes = Arc::clone(&successes);
        handles.push(thread::spawn(move || {
            let mut writer = memtable.writer();
            let mut won = 0usize;
            for key in (thread_id * 100)..=((thread_id + 4) * 100) {
                if writer.insert(key, key).unwrap() {
                    won += 1;
                }
            }
            *successes.lock().unwrap() += won;
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // The union [0, 1900] is present exactly once: every key was won by
    // exactly one thread and no key was lost or duplicated.
    let keys: Vec<i32> = memtable.iter().map(|kv| kv.key).collect();
    assert_eq!(keys, (0..=1900).collect::<Vec<_>>());
    assert_eq!(*successes.lock().unwrap(), 1901);
    assert_eq!(memtable.len(), 1901);
}

#[test]
fn test_concurrent_random_inserts() {
    init_logging();
    let memtable = Arc::new(MemTable::new(MemTableConfig::default()).unwrap());
    let winners = Arc::new(Mutex::new(BTreeSet::new()));
    let mut handles = vec![];

    for thread_id in 0..8u64 {
        let memtable = Arc::clone(&memtable);
        let winners = Arc::clone(&winners);
        handles.push(thread::spawn(move || {
            // Per-thread deterministic key stream with heavy cross-thread
            // collisions.
            let mut state = thread_id * 2654435761 + 1;
            let mut won = vec![];
            for _ in 0..400 {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let key = (state >> 33) as i32 % 2000;
                if memtable.insert(key, key).unwrap() {
                    won.push(key);
                }
            }
            let mut winners = winners.lock().unwrap();
            for key in won {
                // No key is won twice across all threads.
                assert!(winners.insert(key), "key {key} won by two inserts");
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let keys: Vec<i32> = memtable.iter().map(|kv| kv.key).collect();
    assert!(keys.windows(2).all(|w| w[0] < w[1]));

    // The chain holds exactly the keys that some insert won.
    let winners = winners.lock().unwrap();
    assert_eq!(keys, winners.iter().copied().collect::<Vec<_>>());
    assert_eq!(memtable.len(), winners.len());
}

#[test]
fn test_hinted_writers_race_one_shot_writers() {
    init_logging();
    let memtable = Arc::new(MemTable::new(MemTableConfig::default()).unwrap());
    let mut handles = vec![];

    // Hinted writers walk ascending runs while one-shot writers splice
    // keys into the same windows, continually invalidating the hints.
    for thread_id in 0..4i32 {
        let memtable = Arc::clone(&memtable);
        handles.push(thread::spawn(move || {
            let mut writer = memtable.writer();
            for i in 0..500 {
                let key = i * 8 + thread_id;
                assert!(writer.insert(key, key).unwrap());
            }
        }));
    }
    for thread_id in 4..8i32 {
        let memtable = Arc::clone(&memtable);
        handles.push(thread::spawn(move || {
            for i in 0..500 {
                let key = i * 8 + thread_id;
                assert!(memtable.insert(key, key).unwrap());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let keys: Vec<i32> = memtable.iter().map(|kv| kv.key).collect();
    let expected: Vec<i32> = (0..500)
        .flat_map(|i| (0..8).map(move |t| i * 8 + t))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    assert_eq!(keys, expected);
    for key in (0..4000).step_by(131) {
        assert_eq!(memtable.get(key), Some(key));
    }
}
