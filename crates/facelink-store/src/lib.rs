//! facelink-store — concrete adapters behind the core capability traits.
//!
//! SQLite (via tokio-rusqlite) for the durable mapping store, the local
//! filesystem for object storage, and in-memory implementations of both for
//! tests and development.

pub mod fs;
pub mod memory;
pub mod sqlite;

pub use fs::FsObjectStore;
pub use memory::{InMemoryMappingStore, InMemoryObjectStore};
pub use sqlite::SqliteMappingStore;
