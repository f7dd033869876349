// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sets up the owner and member roles of new organizations and boards.
use std::fmt::Display;

use taskboard_core::{Action, Id, PermissionName, ResourceKind, RoleName, UserId};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::authority::{Authority, Permission, Role};

/// Actions granted to every member of a resource.
pub fn member_actions(_kind: ResourceKind) -> Vec<Action> {
    vec![Action::Read]
}

/// Actions granted to the owner of a resource, always a superset of the member actions.
///
/// Only organizations have their own role subsystem, boards don't receive the role management
/// actions.
pub fn owner_actions(kind: ResourceKind) -> Vec<Action> {
    let mut actions = member_actions(kind);
    actions.extend([
        Action::Delete,
        Action::Update,
        Action::AddMembers,
        Action::RemoveMembers,
    ]);
    if kind == ResourceKind::Organization {
        actions.extend([
            Action::CreateRoles,
            Action::EditRoles,
            Action::DeleteRoles,
            Action::AddRoles,
            Action::RemoveRoles,
        ]);
    }
    actions
}

fn permission_names(resource: &Id, actions: &[Action]) -> Vec<String> {
    actions
        .iter()
        .map(|action| PermissionName::resource(resource, *action).to_string())
        .collect()
}

/// Steps of provisioning a resource, in the order they are run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisionStep {
    CreateRoles,
    CreatePermissions,
    GrantPermissions,
    AssignRoles,
}

impl Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = match self {
            ProvisionStep::CreateRoles => "create roles",
            ProvisionStep::CreatePermissions => "create permissions",
            ProvisionStep::GrantPermissions => "grant permissions",
            ProvisionStep::AssignRoles => "assign roles",
        };
        write!(f, "{step}")
    }
}

/// Roles created for a resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionedRoles {
    pub owner: Role,
    pub member: Role,
}

/// Creates and removes the roles and permissions of a resource in the authority.
#[derive(Clone, Debug)]
pub struct Provisioner<A> {
    authority: A,
}

impl<A> Provisioner<A>
where
    A: Authority,
{
    pub fn new(authority: A) -> Self {
        Self { authority }
    }

    /// Provisions a new organization owned by `owner`.
    pub async fn initialize_organization(
        &self,
        owner: &UserId,
        organization: &Id,
    ) -> Result<ProvisionedRoles, ProvisionError<A::Error>> {
        self.initialize_resource(owner, organization, ResourceKind::Organization)
            .await
    }

    /// Provisions a new board owned by `owner`.
    pub async fn initialize_board(
        &self,
        owner: &UserId,
        board: &Id,
    ) -> Result<ProvisionedRoles, ProvisionError<A::Error>> {
        self.initialize_resource(owner, board, ResourceKind::Board)
            .await
    }

    /// Creates the owner and member roles of a resource with their permissions and binds the
    /// owner to both of them.
    ///
    /// Nothing is rolled back on failure. When the authority fails before anything was created
    /// the error is `ProvisionError::Clean`, every later failure leaves the resource partially
    /// provisioned and is reported as `ProvisionError::Partial` naming the failed step.
    pub async fn initialize_resource(
        &self,
        owner: &UserId,
        resource: &Id,
        kind: ResourceKind,
    ) -> Result<ProvisionedRoles, ProvisionError<A::Error>> {
        let owner_role = RoleName::owner(resource);
        let owner_role = self
            .authority
            .create_role(&owner_role.to_string(), &format!("Owner of {kind} {resource}"))
            .await
            .map_err(|err| {
                warn!(%kind, %resource, "provisioning failed: {err}");
                ProvisionError::Clean {
                    kind,
                    resource: resource.clone(),
                    error: err,
                }
            })?;

        let result = self
            .provision(owner, resource, kind, owner_role)
            .await
            .map_err(|(step, err)| {
                error!(
                    %kind,
                    %resource,
                    %step,
                    "provisioning failed, resource is left partially provisioned: {err}"
                );
                ProvisionError::Partial {
                    step,
                    kind,
                    resource: resource.clone(),
                    error: err,
                }
            })?;

        debug!(%kind, %resource, %owner, "provisioned resource");
        Ok(result)
    }

    async fn provision(
        &self,
        owner: &UserId,
        resource: &Id,
        kind: ResourceKind,
        owner_role: Role,
    ) -> Result<ProvisionedRoles, (ProvisionStep, A::Error)> {
        let member_role = self
            .authority
            .create_role(
                &RoleName::member(resource).to_string(),
                &format!("Member of {kind} {resource}"),
            )
            .await
            .map_err(|err| (ProvisionStep::CreateRoles, err))?;

        let owner_actions = owner_actions(kind);
        let permissions: Vec<Permission> = owner_actions
            .iter()
            .map(|action| {
                Permission::new(
                    PermissionName::resource(resource, *action),
                    action.describe(kind.as_str()),
                )
            })
            .collect();
        self.authority
            .create_permissions(&permissions)
            .await
            .map_err(|err| (ProvisionStep::CreatePermissions, err))?;

        self.authority
            .grant_permissions(
                &member_role.id,
                &permission_names(resource, &member_actions(kind)),
            )
            .await
            .map_err(|err| (ProvisionStep::GrantPermissions, err))?;
        self.authority
            .grant_permissions(&owner_role.id, &permission_names(resource, &owner_actions))
            .await
            .map_err(|err| (ProvisionStep::GrantPermissions, err))?;

        self.authority
            .assign_roles(owner, &[owner_role.id.clone(), member_role.id.clone()])
            .await
            .map_err(|err| (ProvisionStep::AssignRoles, err))?;

        Ok(ProvisionedRoles {
            owner: owner_role,
            member: member_role,
        })
    }

    /// Deletes every role and permission of a resource, including custom and delegation roles.
    pub async fn teardown_resource(&self, resource: &Id) -> Result<(), ProvisionError<A::Error>> {
        let prefix = RoleName::prefix(resource);
        let teardown_err = |err| ProvisionError::Teardown {
            resource: resource.clone(),
            error: err,
        };

        let roles = self
            .authority
            .roles_with_prefix(&prefix)
            .await
            .map_err(teardown_err)?;
        for role in &roles {
            self.authority
                .delete_role(&role.id)
                .await
                .map_err(teardown_err)?;
        }

        let permissions: Vec<String> = self
            .authority
            .permissions_with_prefix(&prefix)
            .await
            .map_err(teardown_err)?
            .into_iter()
            .map(|permission| permission.name)
            .collect();
        if !permissions.is_empty() {
            self.authority
                .delete_permissions(&permissions)
                .await
                .map_err(teardown_err)?;
        }

        debug!(
            %resource,
            roles = roles.len(),
            permissions = permissions.len(),
            "tore down resource"
        );
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError<E> {
    /// The authority failed before anything was created.
    #[error("could not provision {kind} {resource}: {error}")]
    Clean {
        kind: ResourceKind,
        resource: Id,
        error: E,
    },

    /// The authority failed after some roles or permissions were created. They are not removed
    /// again, the resource needs manual cleanup before provisioning can be retried.
    #[error("{kind} {resource} is partially provisioned, failed to {step}: {error}")]
    Partial {
        step: ProvisionStep,
        kind: ResourceKind,
        resource: Id,
        error: E,
    },

    #[error("could not remove roles and permissions of {resource}: {error}")]
    Teardown { resource: Id, error: E },
}

impl<E> ProvisionError<E> {
    /// Returns true if the authority was left with some of the resource's roles or permissions.
    pub fn is_partial(&self) -> bool {
        matches!(self, ProvisionError::Partial { .. })
    }
}
