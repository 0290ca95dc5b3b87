//! Mirror SQLite tables into an in-memory database.
//!
//! # Intention
//!
//! - Load a disk table into RAM in fixed row-id windows, query it fast,
//!   and bulk-write new tuples back to disk.
//! - Keep every operation a direct call into the embedded engine; errors are
//!   returned to the caller, who decides whether to abort.
//!
//! # Architectural Boundaries
//!
//! - One in-memory database per [`Mirror`], owned by its [`MemoryStore`].
//! - Disk databases are opened and closed inside each call; there is no pooling.
//! - Identifiers are validated and quoted unless [`IdentifierPolicy::Raw`] is
//!   selected, in which case they are concatenated into SQL as given.
//! - Column definitions passed to [`MemoryStore::create_table`] are raw SQL.

pub mod config;
pub mod disk;
pub mod error;
pub mod ident;
pub mod memory;
pub mod mirror;
pub mod query;
pub mod replicate;
pub mod shape;
pub mod sqlite;

pub use config::MirrorConfig;
pub use disk::DiskStore;
pub use error::{MirrorError, Result};
pub use ident::IdentifierPolicy;
pub use memory::MemoryStore;
pub use mirror::Mirror;
pub use query::PatternQuery;
pub use replicate::{replicate, ReplicationReport, Termination, Window, Windows};
pub use shape::{shape_pairs, shape_pairs_strict};
pub use sqlite::{Row, SqlQuery, Value};
