// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dense positional ordering of panels, stacks and cards.
mod manager;
#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

pub use manager::{PositionError, Positions};
pub use traits::PositionStore;
