// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data types shared by all taskboard crates.
//!
//! Ordered items (panels, stacks and cards) are kept in dense positional order inside their parent
//! scope, organizations and boards own a set of roles and permissions held by an external
//! authority. The names of those roles and permissions are modelled as structured keys here and
//! serialized into the authority's flat string namespace.
pub mod identity;
pub mod items;
pub mod permission;
pub mod resource;

pub use identity::{Id, IdentityError, RoleId, UserId};
pub use items::{
    ItemError, ItemFields, ItemKind, ItemUpdate, OrderedItem, Position, ScopeKind,
};
pub use permission::{
    Action, PermissionName, PermissionNameError, PermissionScope, RoleAction, RoleName,
};
pub use resource::{Board, Organization, ResourceError, ResourceFields, ResourceKind};
