// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transactional persistence for organizations, boards and their ordered items.
//!
//! Panels, stacks and cards are kept in a dense order inside their parent scope: positions always
//! form the sequence `0..n` without gaps or duplicates. `Positions` combines the primitives of a
//! `PositionStore` into create, move and delete operations which each run inside a single,
//! serialized transaction.
//!
//! Two backends are provided, an in-memory store for tests and development and a SQLite store.
#[cfg(feature = "memory")]
pub mod memory;
pub mod positions;
pub mod resources;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
mod traits;

#[cfg(feature = "memory")]
pub use memory::{MemoryError, MemoryStore};
pub use positions::{PositionError, PositionStore, Positions};
pub use resources::ResourceStore;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteError, SqliteStore, SqliteStoreBuilder};
pub use traits::{Transaction, atomically};
