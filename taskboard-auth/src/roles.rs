// SPDX-License-Identifier: MIT OR Apache-2.0

//! Custom roles of organizations and the membership of users in them.
use std::collections::BTreeSet;

use taskboard_core::{
    Action, Id, PermissionName, PermissionNameError, RoleAction, RoleId, RoleName, UserId,
};
use thiserror::Error;
use tracing::debug;

use crate::authority::{Authority, Permission, Role};

/// A custom role together with the delegation role managing its members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomRole {
    pub role: Role,
    pub manager: Role,
}

/// Permission changes applied by `Roles::update_role`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleUpdate {
    pub granted: BTreeSet<Action>,
    pub revoked: BTreeSet<Action>,
}

/// Manages custom roles of a resource and binds users to them.
///
/// Every custom role `org<resource>:<label>` comes with two permissions scoped to it,
/// `org<resource>:role<role>:add_member` and `…:remove_member`, held by the delegation role
/// `org<resource>:role<role>:manager`. The creator of a role is bound to its delegation role and
/// keeps control over its members without the resource-wide `add_roles` and `remove_roles`
/// permissions.
#[derive(Clone, Debug)]
pub struct Roles<A> {
    authority: A,
}

impl<A> Roles<A>
where
    A: Authority,
{
    pub fn new(authority: A) -> Self {
        Self { authority }
    }

    pub async fn create_role(
        &self,
        creator: &UserId,
        resource: &Id,
        label: &str,
        actions: &[Action],
    ) -> Result<CustomRole, RoleError<A::Error>> {
        let name = RoleName::new(resource, label)?;

        let role = self
            .authority
            .create_role(&name.to_string(), &format!("Custom role {label}"))
            .await
            .map_err(|err| RoleError::Authority("create role", err))?;

        let granted = permission_names(resource, actions.iter().copied());
        if !granted.is_empty() {
            self.authority
                .grant_permissions(&role.id, &granted)
                .await
                .map_err(|err| RoleError::Authority("grant permissions", err))?;
        }

        let scoped: Vec<Permission> = RoleAction::ALL
            .iter()
            .map(|action| {
                Permission::new(
                    PermissionName::role(resource, &role.id, *action),
                    action.describe(&role.id),
                )
            })
            .collect();
        self.authority
            .create_permissions(&scoped)
            .await
            .map_err(|err| RoleError::Authority("create permissions", err))?;

        let manager = self
            .authority
            .create_role(
                &RoleName::manager(resource, &role.id).to_string(),
                &format!("Manages members of role {label}"),
            )
            .await
            .map_err(|err| RoleError::Authority("create role", err))?;
        let scoped: Vec<String> = scoped.into_iter().map(|permission| permission.name).collect();
        self.authority
            .grant_permissions(&manager.id, &scoped)
            .await
            .map_err(|err| RoleError::Authority("grant permissions", err))?;

        self.authority
            .assign_roles(creator, &[manager.id.clone()])
            .await
            .map_err(|err| RoleError::Authority("assign roles", err))?;

        debug!(%resource, role = %role.id, %creator, "created role {name}");
        Ok(CustomRole { role, manager })
    }

    /// Grants the actions missing on the role and revokes all others.
    pub async fn update_role(
        &self,
        resource: &Id,
        role: &RoleId,
        actions: &[Action],
    ) -> Result<RoleUpdate, RoleError<A::Error>> {
        let role = self.custom_role(resource, role).await?;

        let current: BTreeSet<Action> = self
            .authority
            .role_permissions(&role.id)
            .await
            .map_err(|err| RoleError::Authority("list permissions", err))?
            .iter()
            .filter_map(|name| name.parse::<PermissionName>().ok())
            .filter(|name| &name.resource == resource)
            .filter_map(|name| name.action())
            .collect();
        let desired: BTreeSet<Action> = actions.iter().copied().collect();

        let update = RoleUpdate {
            granted: desired.difference(&current).copied().collect(),
            revoked: current.difference(&desired).copied().collect(),
        };

        if !update.granted.is_empty() {
            self.authority
                .grant_permissions(
                    &role.id,
                    &permission_names(resource, update.granted.iter().copied()),
                )
                .await
                .map_err(|err| RoleError::Authority("grant permissions", err))?;
        }
        if !update.revoked.is_empty() {
            self.authority
                .revoke_permissions(
                    &role.id,
                    &permission_names(resource, update.revoked.iter().copied()),
                )
                .await
                .map_err(|err| RoleError::Authority("revoke permissions", err))?;
        }

        debug!(
            %resource,
            role = %role.id,
            granted = update.granted.len(),
            revoked = update.revoked.len(),
            "updated role"
        );
        Ok(update)
    }

    /// Deletes a custom role, its delegation role and the permissions scoped to it.
    pub async fn delete_role(
        &self,
        resource: &Id,
        role: &RoleId,
    ) -> Result<(), RoleError<A::Error>> {
        let role = self.custom_role(resource, role).await?;

        let manager = self
            .authority
            .find_role(&RoleName::manager(resource, &role.id).to_string())
            .await
            .map_err(|err| RoleError::Authority("find role", err))?;
        if let Some(manager) = manager {
            self.authority
                .delete_role(&manager.id)
                .await
                .map_err(|err| RoleError::Authority("delete role", err))?;
        }

        let scoped: Vec<String> = RoleAction::ALL
            .iter()
            .map(|action| PermissionName::role(resource, &role.id, *action).to_string())
            .collect();
        self.authority
            .delete_permissions(&scoped)
            .await
            .map_err(|err| RoleError::Authority("delete permissions", err))?;

        self.authority
            .delete_role(&role.id)
            .await
            .map_err(|err| RoleError::Authority("delete role", err))?;

        debug!(%resource, role = %role.id, "deleted role {}", role.name);
        Ok(())
    }

    /// Binds a user to a role of the resource.
    pub async fn add_role_member(
        &self,
        resource: &Id,
        role: &RoleId,
        user: &UserId,
    ) -> Result<(), RoleError<A::Error>> {
        let role = self.resource_role(resource, role).await?;
        self.authority
            .assign_roles(user, &[role.id])
            .await
            .map_err(|err| RoleError::Authority("assign roles", err))
    }

    /// Unbinds a user from a role of the resource.
    pub async fn remove_role_member(
        &self,
        resource: &Id,
        role: &RoleId,
        user: &UserId,
    ) -> Result<(), RoleError<A::Error>> {
        let role = self.resource_role(resource, role).await?;
        self.authority
            .unassign_roles(user, &[role.id])
            .await
            .map_err(|err| RoleError::Authority("unassign roles", err))
    }

    /// Makes a user member of the resource.
    pub async fn add_member(
        &self,
        resource: &Id,
        user: &UserId,
    ) -> Result<(), RoleError<A::Error>> {
        let member = self.member_role(resource).await?;
        self.authority
            .assign_roles(user, &[member.id])
            .await
            .map_err(|err| RoleError::Authority("assign roles", err))?;
        debug!(%resource, %user, "added member");
        Ok(())
    }

    /// Removes a user from the resource, including every other role they hold on it.
    pub async fn remove_member(
        &self,
        resource: &Id,
        user: &UserId,
    ) -> Result<(), RoleError<A::Error>> {
        let prefix = RoleName::prefix(resource);
        let roles: Vec<RoleId> = self
            .authority
            .user_roles(user)
            .await
            .map_err(|err| RoleError::Authority("list user roles", err))?
            .into_iter()
            .filter(|role| role.name.starts_with(&prefix))
            .map(|role| role.id)
            .collect();

        if !roles.is_empty() {
            self.authority
                .unassign_roles(user, &roles)
                .await
                .map_err(|err| RoleError::Authority("unassign roles", err))?;
        }
        debug!(%resource, %user, roles = roles.len(), "removed member");
        Ok(())
    }

    /// Roles of the resource, without delegation roles.
    pub async fn roles(&self, resource: &Id) -> Result<Vec<Role>, RoleError<A::Error>> {
        let roles = self
            .authority
            .roles_with_prefix(&RoleName::prefix(resource))
            .await
            .map_err(|err| RoleError::Authority("list roles", err))?;
        Ok(roles
            .into_iter()
            .filter(|role| {
                role.name
                    .parse::<RoleName>()
                    .is_ok_and(|name| name.role.is_none())
            })
            .collect())
    }

    /// Users bound to the member role of the resource.
    pub async fn members(&self, resource: &Id) -> Result<Vec<UserId>, RoleError<A::Error>> {
        let member = self.member_role(resource).await?;
        self.authority
            .role_members(&member.id)
            .await
            .map_err(|err| RoleError::Authority("list role members", err))
    }

    async fn member_role(&self, resource: &Id) -> Result<Role, RoleError<A::Error>> {
        let name = RoleName::member(resource).to_string();
        self.authority
            .find_role(&name)
            .await
            .map_err(|err| RoleError::Authority("find role", err))?
            .ok_or(RoleError::MissingRole(name))
    }

    /// Looks up a role of the resource which users can be bound to directly.
    async fn resource_role(
        &self,
        resource: &Id,
        role: &RoleId,
    ) -> Result<Role, RoleError<A::Error>> {
        self.roles(resource)
            .await?
            .into_iter()
            .find(|candidate| &candidate.id == role)
            .ok_or_else(|| RoleError::UnknownRole(resource.clone(), role.clone()))
    }

    /// Looks up a role of the resource which is neither the owner nor the member role.
    async fn custom_role(
        &self,
        resource: &Id,
        role: &RoleId,
    ) -> Result<Role, RoleError<A::Error>> {
        let role = self.resource_role(resource, role).await?;
        match role.name.parse::<RoleName>() {
            Ok(name) if !name.is_builtin() => Ok(role),
            _ => Err(RoleError::Protected(role.name)),
        }
    }
}

fn permission_names(resource: &Id, actions: impl Iterator<Item = Action>) -> Vec<String> {
    actions
        .map(|action| PermissionName::resource(resource, action).to_string())
        .collect()
}

#[derive(Debug, Error)]
pub enum RoleError<E> {
    #[error(transparent)]
    InvalidLabel(#[from] PermissionNameError),

    #[error("{1} is not a role of {0}")]
    UnknownRole(Id, RoleId),

    #[error("role '{0}' does not exist")]
    MissingRole(String),

    /// Owner and member roles are managed through provisioning only.
    #[error("role '{0}' can't be changed")]
    Protected(String),

    #[error("authority failed to {0}: {1}")]
    Authority(&'static str, E),
}
