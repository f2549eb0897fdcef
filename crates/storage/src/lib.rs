//! Storage layer for appstruct
//!
//! This crate implements the storage collaborator seam of `appstruct-core`:
//! - MemStorage: FxHashMap of partitions, each a BTreeMap ordered by
//!   clustering columns, behind a `parking_lot::RwLock`
//! - MemStorageProvider: one MemStorage per application name
//! - FixedStorageProvider: hands out one given store for every application
//! - testing::TestStorage: wrapper injecting scheduled errors and damage

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod mem;
pub mod provider;
pub mod testing;

pub use mem::MemStorage;
pub use provider::{FixedStorageProvider, MemStorageProvider};
