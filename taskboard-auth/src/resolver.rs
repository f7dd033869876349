// SPDX-License-Identifier: MIT OR Apache-2.0

//! Answers whether a user holds a permission, based on the roles the authority binds them to.
use std::collections::BTreeSet;

use taskboard_core::{Id, PermissionName, RoleAction, RoleId, UserId};
use thiserror::Error;
use tracing::debug;

use crate::authority::Authority;

/// Resolves the permissions of users through their roles.
///
/// Nothing is cached, every check reflects the current state of the authority. Failing authority
/// calls are surfaced as errors and never read as a granted or denied permission.
#[derive(Clone, Debug)]
pub struct PermissionResolver<A> {
    authority: A,
}

impl<A> PermissionResolver<A>
where
    A: Authority,
{
    pub fn new(authority: A) -> Self {
        Self { authority }
    }

    /// Names of all permissions granted to the user across all their roles.
    ///
    /// Takes one call to look up the roles of the user and one call per role.
    pub async fn permissions(
        &self,
        user: &UserId,
    ) -> Result<BTreeSet<String>, ResolveError<A::Error>> {
        let roles = self
            .authority
            .user_roles(user)
            .await
            .map_err(|err| ResolveError::UserRoles(user.clone(), err))?;

        let mut permissions = BTreeSet::new();
        for role in roles {
            let granted = self
                .authority
                .role_permissions(&role.id)
                .await
                .map_err(|err| ResolveError::RolePermissions(role.id.clone(), err))?;
            permissions.extend(granted);
        }

        Ok(permissions)
    }

    /// Returns true if any role of the user grants exactly this permission.
    pub async fn has_permission(
        &self,
        user: &UserId,
        permission: &PermissionName,
    ) -> Result<bool, ResolveError<A::Error>> {
        let granted = self
            .permissions(user)
            .await?
            .contains(&permission.to_string());
        debug!(%user, %permission, granted, "resolved permission");
        Ok(granted)
    }

    /// Returns true if the user may add members to the role.
    ///
    /// The permission scoped to the role is sufficient on its own. Only when it is missing the
    /// resource-wide `add_roles` permission is looked up.
    pub async fn can_add_member_to_role(
        &self,
        user: &UserId,
        resource: &Id,
        role: &RoleId,
    ) -> Result<bool, ResolveError<A::Error>> {
        self.can_manage_role(user, resource, role, RoleAction::AddMember)
            .await
    }

    /// Returns true if the user may remove members from the role, falling back to the
    /// resource-wide `remove_roles` permission.
    pub async fn can_remove_member_from_role(
        &self,
        user: &UserId,
        resource: &Id,
        role: &RoleId,
    ) -> Result<bool, ResolveError<A::Error>> {
        self.can_manage_role(user, resource, role, RoleAction::RemoveMember)
            .await
    }

    async fn can_manage_role(
        &self,
        user: &UserId,
        resource: &Id,
        role: &RoleId,
        action: RoleAction,
    ) -> Result<bool, ResolveError<A::Error>> {
        let scoped = PermissionName::role(resource, role, action);
        if self.has_permission(user, &scoped).await? {
            return Ok(true);
        }

        let blanket = PermissionName::resource(resource, action.blanket());
        self.has_permission(user, &blanket).await
    }
}

/// Returns true if the space-delimited scope string contains the scope.
pub fn has_scope(scopes: &str, scope: &str) -> bool {
    scopes.split_whitespace().any(|granted| granted == scope)
}

#[derive(Debug, Error)]
pub enum ResolveError<E> {
    #[error("could not look up roles of user {0}: {1}")]
    UserRoles(UserId, E),

    #[error("could not look up permissions of role {0}: {1}")]
    RolePermissions(RoleId, E),
}

#[cfg(test)]
mod tests {
    use taskboard_core::{Action, Id, PermissionName, RoleAction, RoleId, UserId};

    use crate::authority::{Authority, MemoryAuthority, Permission};

    use super::{PermissionResolver, ResolveError, has_scope};

    fn user(value: &str) -> UserId {
        value.parse().unwrap()
    }

    fn id(value: &str) -> Id {
        value.parse().unwrap()
    }

    /// Creates a role granting the permissions and binds the user to it.
    async fn grant(authority: &MemoryAuthority, user: &UserId, name: &str, permissions: &[&str]) {
        let role = authority.create_role(name, "").await.unwrap();
        let permissions: Vec<Permission> = permissions
            .iter()
            .map(|permission| Permission::new(permission, ""))
            .collect();
        let names: Vec<String> = permissions.iter().map(|p| p.name.clone()).collect();
        authority.create_permissions(&permissions).await.unwrap();
        authority.grant_permissions(&role.id, &names).await.unwrap();
        authority.assign_roles(user, &[role.id]).await.unwrap();
    }

    #[tokio::test]
    async fn exact_permission_names() {
        let authority = MemoryAuthority::new();
        let alice = user("auth0|alice");
        grant(&authority, &alice, "org42:member", &["org42:read"]).await;

        let resolver = PermissionResolver::new(authority);
        let read = PermissionName::resource(&id("42"), Action::Read);
        assert!(resolver.has_permission(&alice, &read).await.unwrap());

        // Granted for another resource or another action only.
        let update = PermissionName::resource(&id("42"), Action::Update);
        let other = PermissionName::resource(&id("420"), Action::Read);
        assert!(!resolver.has_permission(&alice, &update).await.unwrap());
        assert!(!resolver.has_permission(&alice, &other).await.unwrap());

        // Users without roles hold nothing.
        assert!(
            !resolver
                .has_permission(&user("auth0|bob"), &read)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn permissions_are_unioned_across_roles() {
        let authority = MemoryAuthority::new();
        let alice = user("auth0|alice");
        grant(&authority, &alice, "org1:member", &["org1:read"]).await;
        grant(&authority, &alice, "org2:owner", &["org2:read", "org2:update"]).await;

        let resolver = PermissionResolver::new(authority);
        let permissions = resolver.permissions(&alice).await.unwrap();
        assert_eq!(
            permissions.into_iter().collect::<Vec<_>>(),
            vec!["org1:read", "org2:read", "org2:update"]
        );
    }

    #[tokio::test]
    async fn authority_failure_is_an_error() {
        let authority = MemoryAuthority::new();
        let alice = user("auth0|alice");
        grant(&authority, &alice, "org42:member", &["org42:read"]).await;

        let resolver = PermissionResolver::new(authority.clone());
        let read = PermissionName::resource(&id("42"), Action::Read);

        authority.fail_after(0);
        assert!(matches!(
            resolver.has_permission(&alice, &read).await,
            Err(ResolveError::UserRoles(_, _))
        ));

        // Roles were found but their permissions could not be fetched.
        authority.fail_after(1);
        assert!(matches!(
            resolver.has_permission(&alice, &read).await,
            Err(ResolveError::RolePermissions(_, _))
        ));
    }

    #[tokio::test]
    async fn role_scoped_permission_is_sufficient() {
        let authority = MemoryAuthority::new();
        let alice = user("auth0|alice");
        let role: RoleId = "7".parse().unwrap();
        grant(&authority, &alice, "org42:role7:manager", &["org42:role7:add_member"]).await;

        let resolver = PermissionResolver::new(authority.clone());

        let calls = authority.calls();
        assert!(
            resolver
                .can_add_member_to_role(&alice, &id("42"), &role)
                .await
                .unwrap()
        );
        // One lookup of the user's roles and one of the single role's permissions, the
        // resource-wide permission is never consulted.
        assert_eq!(authority.calls() - calls, 2);

        // The scoped permission covers adding only.
        let calls = authority.calls();
        assert!(
            !resolver
                .can_remove_member_from_role(&alice, &id("42"), &role)
                .await
                .unwrap()
        );
        assert_eq!(authority.calls() - calls, 4);

        // Scoped to another role.
        let other: RoleId = "8".parse().unwrap();
        assert!(
            !resolver
                .can_add_member_to_role(&alice, &id("42"), &other)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn blanket_permission_covers_every_role() {
        let authority = MemoryAuthority::new();
        let alice = user("auth0|alice");
        grant(
            &authority,
            &alice,
            "org42:owner",
            &["org42:add_roles", "org42:remove_roles"],
        )
        .await;

        let resolver = PermissionResolver::new(authority);
        for role in ["7", "8"] {
            let role: RoleId = role.parse().unwrap();
            assert!(
                resolver
                    .can_add_member_to_role(&alice, &id("42"), &role)
                    .await
                    .unwrap()
            );
            assert!(
                resolver
                    .can_remove_member_from_role(&alice, &id("42"), &role)
                    .await
                    .unwrap()
            );
        }

        let scoped = PermissionName::role(&id("42"), &"7".parse().unwrap(), RoleAction::AddMember);
        assert!(!resolver.has_permission(&alice, &scoped).await.unwrap());
    }

    #[test]
    fn scope_strings() {
        let scopes = "openid profile  org42:read\torg42:update";
        assert!(has_scope(scopes, "org42:read"));
        assert!(has_scope(scopes, "org42:update"));
        assert!(has_scope(scopes, "openid"));
        assert!(!has_scope(scopes, "org42"));
        assert!(!has_scope("", "openid"));
    }
}
