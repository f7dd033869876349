// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use taskboard_core::{IdentityError, RoleId, UserId};
use thiserror::Error;

use crate::authority::{Authority, Permission, Role};

#[derive(Debug, Default)]
struct InnerAuthority {
    next_role: u64,
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<String, Permission>,
    grants: BTreeMap<RoleId, BTreeSet<String>>,
    bindings: BTreeMap<UserId, BTreeSet<RoleId>>,
}

/// In-process authority for tests and development.
///
/// Mirrors the behaviour of the management API: role names are unique, granting unregistered
/// permissions fails and deleting a role removes all its grants and bindings.
///
/// Every call is counted. With `fail_after` the authority can be instructed to fail all calls
/// after a number of successful ones, which is used to inject failures in the middle of a
/// multi-step sequence.
#[derive(Clone, Debug, Default)]
pub struct MemoryAuthority {
    inner: Arc<RwLock<InnerAuthority>>,
    calls: Arc<AtomicUsize>,
    failing_from: Arc<RwLock<Option<usize>>>,
}

impl MemoryAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls made to this authority so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Lets the next `n` calls succeed and all following ones fail.
    pub fn fail_after(&self, n: usize) {
        let mut failing_from = self
            .failing_from
            .write()
            .expect("acquire exclusive write access on failure setting");
        failing_from.replace(self.calls() + n);
    }

    /// Lets all following calls succeed again.
    pub fn recover(&self) {
        self.failing_from
            .write()
            .expect("acquire exclusive write access on failure setting")
            .take();
    }

    fn call(&self) -> Result<(), MemoryAuthorityError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let failing_from = *self
            .failing_from
            .read()
            .expect("acquire shared read access on failure setting");
        match failing_from {
            Some(limit) if call >= limit => Err(MemoryAuthorityError::Unavailable(call)),
            _ => Ok(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, InnerAuthority> {
        self.inner
            .read()
            .expect("acquire shared read access on authority")
    }

    fn write(&self) -> RwLockWriteGuard<'_, InnerAuthority> {
        self.inner
            .write()
            .expect("acquire exclusive write access on authority")
    }
}

impl InnerAuthority {
    fn role(&self, role: &RoleId) -> Result<&Role, MemoryAuthorityError> {
        self.roles
            .get(role)
            .ok_or_else(|| MemoryAuthorityError::RoleNotFound(role.clone()))
    }
}

impl Authority for MemoryAuthority {
    type Error = MemoryAuthorityError;

    async fn create_role(&self, name: &str, description: &str) -> Result<Role, Self::Error> {
        self.call()?;
        let mut inner = self.write();

        if inner.roles.values().any(|role| role.name == name) {
            return Err(MemoryAuthorityError::DuplicateRole(name.to_string()));
        }

        inner.next_role += 1;
        let role = Role {
            id: format!("rol_{}", inner.next_role).parse()?,
            name: name.to_string(),
            description: description.to_string(),
        };
        inner.roles.insert(role.id.clone(), role.clone());
        Ok(role)
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, Self::Error> {
        self.call()?;
        Ok(self
            .read()
            .roles
            .values()
            .find(|role| role.name == name)
            .cloned())
    }

    async fn roles_with_prefix(&self, prefix: &str) -> Result<Vec<Role>, Self::Error> {
        self.call()?;
        Ok(self
            .read()
            .roles
            .values()
            .filter(|role| role.name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_role(&self, role: &RoleId) -> Result<(), Self::Error> {
        self.call()?;
        let mut inner = self.write();
        inner.role(role)?;
        inner.roles.remove(role);
        inner.grants.remove(role);
        for roles in inner.bindings.values_mut() {
            roles.remove(role);
        }
        Ok(())
    }

    async fn create_permissions(&self, permissions: &[Permission]) -> Result<(), Self::Error> {
        self.call()?;
        let mut inner = self.write();
        for permission in permissions {
            inner
                .permissions
                .entry(permission.name.clone())
                .or_insert_with(|| permission.clone());
        }
        Ok(())
    }

    async fn permissions_with_prefix(&self, prefix: &str) -> Result<Vec<Permission>, Self::Error> {
        self.call()?;
        Ok(self
            .read()
            .permissions
            .values()
            .filter(|permission| permission.name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_permissions(&self, names: &[String]) -> Result<(), Self::Error> {
        self.call()?;
        let mut inner = self.write();
        for name in names {
            inner.permissions.remove(name);
            for granted in inner.grants.values_mut() {
                granted.remove(name);
            }
        }
        Ok(())
    }

    async fn grant_permissions(&self, role: &RoleId, names: &[String]) -> Result<(), Self::Error> {
        self.call()?;
        let mut inner = self.write();
        inner.role(role)?;
        if let Some(missing) = names
            .iter()
            .find(|name| !inner.permissions.contains_key(*name))
        {
            return Err(MemoryAuthorityError::PermissionNotFound(missing.clone()));
        }
        inner
            .grants
            .entry(role.clone())
            .or_default()
            .extend(names.iter().cloned());
        Ok(())
    }

    async fn revoke_permissions(&self, role: &RoleId, names: &[String]) -> Result<(), Self::Error> {
        self.call()?;
        let mut inner = self.write();
        inner.role(role)?;
        if let Some(granted) = inner.grants.get_mut(role) {
            for name in names {
                granted.remove(name);
            }
        }
        Ok(())
    }

    async fn role_permissions(&self, role: &RoleId) -> Result<Vec<String>, Self::Error> {
        self.call()?;
        let inner = self.read();
        inner.role(role)?;
        Ok(inner
            .grants
            .get(role)
            .map(|granted| granted.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn assign_roles(&self, user: &UserId, roles: &[RoleId]) -> Result<(), Self::Error> {
        self.call()?;
        let mut inner = self.write();
        for role in roles {
            inner.role(role)?;
        }
        inner
            .bindings
            .entry(user.clone())
            .or_default()
            .extend(roles.iter().cloned());
        Ok(())
    }

    async fn unassign_roles(&self, user: &UserId, roles: &[RoleId]) -> Result<(), Self::Error> {
        self.call()?;
        let mut inner = self.write();
        if let Some(bound) = inner.bindings.get_mut(user) {
            for role in roles {
                bound.remove(role);
            }
        }
        Ok(())
    }

    async fn user_roles(&self, user: &UserId) -> Result<Vec<Role>, Self::Error> {
        self.call()?;
        let inner = self.read();
        let Some(bound) = inner.bindings.get(user) else {
            return Ok(Vec::new());
        };
        Ok(bound
            .iter()
            .filter_map(|role| inner.roles.get(role).cloned())
            .collect())
    }

    async fn role_members(&self, role: &RoleId) -> Result<Vec<UserId>, Self::Error> {
        self.call()?;
        let inner = self.read();
        inner.role(role)?;
        Ok(inner
            .bindings
            .iter()
            .filter(|(_, bound)| bound.contains(role))
            .map(|(user, _)| user.clone())
            .collect())
    }
}

#[derive(Debug, Error)]
pub enum MemoryAuthorityError {
    /// Injected failure, see `MemoryAuthority::fail_after`.
    #[error("authority unavailable on call {0}")]
    Unavailable(usize),

    #[error("role {0} not found")]
    RoleNotFound(RoleId),

    #[error("permission '{0}' not found")]
    PermissionNotFound(String),

    #[error("role '{0}' already exists")]
    DuplicateRole(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

#[cfg(test)]
mod tests {
    use taskboard_core::UserId;

    use crate::authority::{Authority, MemoryAuthority, MemoryAuthorityError, Permission};

    fn user(value: &str) -> UserId {
        value.parse().unwrap()
    }

    #[tokio::test]
    async fn grants_and_bindings() {
        let authority = MemoryAuthority::new();
        let role = authority.create_role("org1:member", "Members").await.unwrap();

        authority
            .create_permissions(&[Permission::new("org1:read", "Read board")])
            .await
            .unwrap();
        authority
            .grant_permissions(&role.id, &["org1:read".to_string()])
            .await
            .unwrap();
        authority
            .assign_roles(&user("auth0|alice"), &[role.id.clone()])
            .await
            .unwrap();

        assert_eq!(
            authority.role_permissions(&role.id).await.unwrap(),
            vec!["org1:read".to_string()]
        );
        assert_eq!(
            authority.user_roles(&user("auth0|alice")).await.unwrap(),
            vec![role.clone()]
        );
        assert_eq!(
            authority.role_members(&role.id).await.unwrap(),
            vec![user("auth0|alice")]
        );

        // Deleting the role removes grants and bindings.
        authority.delete_role(&role.id).await.unwrap();
        assert!(
            authority
                .user_roles(&user("auth0|alice"))
                .await
                .unwrap()
                .is_empty()
        );
        assert!(authority.find_role("org1:member").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_unknown_permissions_and_duplicates() {
        let authority = MemoryAuthority::new();
        let role = authority.create_role("org1:owner", "").await.unwrap();

        assert!(matches!(
            authority.create_role("org1:owner", "").await,
            Err(MemoryAuthorityError::DuplicateRole(_))
        ));
        assert!(matches!(
            authority
                .grant_permissions(&role.id, &["org1:fly".to_string()])
                .await,
            Err(MemoryAuthorityError::PermissionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn injected_failures() {
        let authority = MemoryAuthority::new();
        authority.fail_after(1);

        assert!(authority.find_role("org1:owner").await.is_ok());
        assert!(matches!(
            authority.find_role("org1:owner").await,
            Err(MemoryAuthorityError::Unavailable(1))
        ));
        assert_eq!(authority.calls(), 2);

        authority.recover();
        assert!(authority.find_role("org1:owner").await.is_ok());
    }
}
