//! Storage backend API.
//!
//! This module defines the traits and types for pluggable storage backends.
//!
//! # Traits
//!
//! - [`StorageBackend`]: Main trait for storage implementations. Creates read views and write batches.
//! - [`StorageReadView`]: Read-only access to a consistent snapshot via `get` and `prefix_iterator`.
//! - [`StorageWriteBatch`]: Serialized read-modify-write access with atomic `commit`.
//!
//! # Tables
//!
//! Storage is organized into [`Table`]s, each storing a different type of data.
//! All keys and values are byte slices (`&[u8]` / `Vec<u8>`).

mod tables;
mod traits;

#[cfg(feature = "rocksdb")]
pub use tables::ALL_TABLES;
pub use tables::Table;
pub use traits::{Error, PrefixResult, StorageBackend, StorageReadView, StorageWriteBatch};
