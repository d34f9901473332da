//! Core types and traits for PlumeDB
//!
//! This crate contains the fundamental types and error handling used throughout
//! the PlumeDB project. It provides:
//!
//! - Common error types with [`Error`] and [`Result`]
//! - Basic data types like [`Key`], [`Value`], and [`KeyValue`]
//!
//! # Example
//!
//! ```
//! use plumedb_core::{Key, KeyValue, Value};
//!
//! let key: Key = 42;
//! let value: Value = 7;
//! let entry = KeyValue { key, value };
//! ```

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
