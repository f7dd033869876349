// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability interface of the external identity provider holding roles, permissions and the
//! bindings of users to roles.
#[cfg(feature = "management")]
mod management;
mod memory;

use std::error::Error;

use serde::{Deserialize, Serialize};
use taskboard_core::{RoleId, UserId};

#[cfg(feature = "management")]
pub use management::{ManagementClient, ManagementConfig, ManagementError};
pub use memory::{MemoryAuthority, MemoryAuthorityError};

/// Role as known to the authority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Permission as known to the authority.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub name: String,
    pub description: String,
}

impl Permission {
    pub fn new(name: impl ToString, description: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Roles, permissions and user bindings held by an external authority.
///
/// Names live in one flat namespace. Everything related to a taskboard resource shares the prefix
/// `org<resource>:`, which is how resources are listed and torn down.
///
/// Every call maps to one round trip to the authority.
pub trait Authority {
    type Error: Error;

    /// Creates a role and returns it with the id the authority assigned to it.
    fn create_role(
        &self,
        name: &str,
        description: &str,
    ) -> impl Future<Output = Result<Role, Self::Error>>;

    /// Looks up a role by its exact name.
    fn find_role(&self, name: &str) -> impl Future<Output = Result<Option<Role>, Self::Error>>;

    /// Lists all roles whose name starts with the prefix.
    fn roles_with_prefix(&self, prefix: &str)
    -> impl Future<Output = Result<Vec<Role>, Self::Error>>;

    /// Deletes a role and all bindings of users to it.
    fn delete_role(&self, role: &RoleId) -> impl Future<Output = Result<(), Self::Error>>;

    /// Registers permissions in one batch. Already registered names are kept as they are.
    fn create_permissions(
        &self,
        permissions: &[Permission],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Lists all registered permissions whose name starts with the prefix.
    fn permissions_with_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<Permission>, Self::Error>>;

    /// Unregisters permissions in one batch and revokes them from every role.
    fn delete_permissions(&self, names: &[String])
    -> impl Future<Output = Result<(), Self::Error>>;

    /// Grants registered permissions to a role.
    fn grant_permissions(
        &self,
        role: &RoleId,
        names: &[String],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Revokes permissions from a role.
    fn revoke_permissions(
        &self,
        role: &RoleId,
        names: &[String],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Names of all permissions granted to a role.
    fn role_permissions(
        &self,
        role: &RoleId,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>>;

    /// Binds a user to roles.
    fn assign_roles(
        &self,
        user: &UserId,
        roles: &[RoleId],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Unbinds a user from roles.
    fn unassign_roles(
        &self,
        user: &UserId,
        roles: &[RoleId],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// All roles a user is bound to.
    fn user_roles(&self, user: &UserId) -> impl Future<Output = Result<Vec<Role>, Self::Error>>;

    /// All users bound to a role.
    fn role_members(&self, role: &RoleId)
    -> impl Future<Output = Result<Vec<UserId>, Self::Error>>;
}
