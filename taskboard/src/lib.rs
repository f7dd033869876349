// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend core of a collaborative task board.
//!
//! Organizations and boards are stored in SQLite, their panels, stacks and cards are kept in a
//! dense order inside their parent. Who may read or change them is decided by roles and
//! permissions held by an external authority, every resource comes with an owner and a member
//! role and organizations can define custom roles on top.
//!
//! ```rust,no_run
//! # use taskboard::{Config, Service};
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_path("taskboard.toml")?;
//! let service = Service::from_config(config).await?;
//!
//! let owner = "auth0|alice".parse()?;
//! let board = service
//!     .create_board(&owner, taskboard::ResourceFields::new("Roadmap"), true)
//!     .await?;
//! service
//!     .create_panel(&owner, &board.id, taskboard::ItemFields::new("Todo"))
//!     .await?;
//! # Ok(())
//! # }
//! ```
mod builder;
pub mod config;
mod error;
mod service;
#[cfg(feature = "test_utils")]
pub mod test_utils;

pub use builder::{ServiceBuilder, StartError};
pub use config::Config;
pub use error::{ErrorKind, ServiceError};
pub use service::Service;
pub use taskboard_auth::{
    Authority, CustomRole, ManagementClient, ManagementConfig, MemoryAuthority, Role, RoleUpdate,
};
pub use taskboard_core::{
    Action, Board, Id, ItemFields, ItemKind, ItemUpdate, OrderedItem, Organization,
    PermissionName, Position, ResourceFields, RoleAction, RoleId, UserId,
};
