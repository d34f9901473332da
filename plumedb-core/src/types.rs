//! Core types used throughout PlumeDB
//!
//! This module contains the fundamental data types that form the basis
//! of PlumeDB's data model.

use serde::{Deserialize, Serialize};

/// A key in the index, represented as a 32-bit signed integer
pub type Key = i32;

/// A value in the index, represented as a 32-bit signed integer
pub type Value = i32;

/// A simple key-value pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// The key
    pub key: Key,
    /// The value
    pub value: Value,
}
