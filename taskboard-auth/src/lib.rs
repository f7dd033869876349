// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delegated, role-based permissions of organizations and boards.
//!
//! Roles, permissions and the bindings of users to roles are held by an external authority, see
//! `Authority`. On top of it this crate provides
//!
//! - `PermissionResolver`: checks whether a user holds a permission through any of their roles,
//! - `Provisioner`: creates the owner and member roles of new resources and removes everything of
//!   a resource again,
//! - `Roles`: custom roles of organizations and the membership of users in them.
pub mod authority;
pub mod provisioning;
pub mod resolver;
pub mod roles;

pub use authority::{Authority, MemoryAuthority, MemoryAuthorityError, Permission, Role};
#[cfg(feature = "management")]
pub use authority::{ManagementClient, ManagementConfig, ManagementError};
pub use provisioning::{
    ProvisionError, ProvisionStep, ProvisionedRoles, Provisioner, member_actions, owner_actions,
};
pub use resolver::{PermissionResolver, ResolveError, has_scope};
pub use roles::{CustomRole, RoleError, RoleUpdate, Roles};
