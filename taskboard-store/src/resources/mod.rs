// SPDX-License-Identifier: MIT OR Apache-2.0

//! Organizations and boards.
#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
#[cfg(test)]
mod tests;
mod traits;

pub use traits::ResourceStore;
