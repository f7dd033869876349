// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured names of roles and permissions held by the external authority.
//!
//! The authority only knows a flat string namespace, the hierarchy of resources, roles and actions
//! is encoded in colon-separated segments:
//!
//! ```text
//! org<resource>:<action>                   resource-wide ("blanket") permission
//! org<resource>:role<role>:<role-action>   permission scoped to a single role
//! org<resource>:<label>                    role of a resource
//! org<resource>:role<role>:<label>         role scoped to another role
//! ```
//!
//! Boards and organizations share the `org` prefix. Their identifiers are random and never
//! collide.
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{IdentityError, NAMESPACE_SEPARATOR};
use crate::{Id, RoleId};

const RESOURCE_PREFIX: &str = "org";

const ROLE_PREFIX: &str = "role";

/// Actions on a whole organization or board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Delete,
    Update,
    AddMembers,
    RemoveMembers,
    CreateRoles,
    EditRoles,
    DeleteRoles,
    AddRoles,
    RemoveRoles,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::Read,
        Action::Delete,
        Action::Update,
        Action::AddMembers,
        Action::RemoveMembers,
        Action::CreateRoles,
        Action::EditRoles,
        Action::DeleteRoles,
        Action::AddRoles,
        Action::RemoveRoles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Delete => "delete",
            Action::Update => "update",
            Action::AddMembers => "add_members",
            Action::RemoveMembers => "remove_members",
            Action::CreateRoles => "create_roles",
            Action::EditRoles => "edit_roles",
            Action::DeleteRoles => "delete_roles",
            Action::AddRoles => "add_roles",
            Action::RemoveRoles => "remove_roles",
        }
    }

    /// Human-readable description stored next to the permission in the authority.
    pub fn describe(&self, resource_kind: &str) -> String {
        let what = match self {
            Action::Read => "Read",
            Action::Delete => "Delete",
            Action::Update => "Update",
            Action::AddMembers => "Add members to",
            Action::RemoveMembers => "Remove members from",
            Action::CreateRoles => "Create roles of",
            Action::EditRoles => "Edit roles of",
            Action::DeleteRoles => "Delete roles of",
            Action::AddRoles => "Add users to any role of",
            Action::RemoveRoles => "Remove users from any role of",
        };
        format!("{what} {resource_kind}")
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = PermissionNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| PermissionNameError::UnknownAction(value.to_string()))
    }
}

/// Actions delegated on a single role, granted to the creator of that role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleAction {
    AddMember,
    RemoveMember,
}

impl RoleAction {
    pub const ALL: [RoleAction; 2] = [RoleAction::AddMember, RoleAction::RemoveMember];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleAction::AddMember => "add_member",
            RoleAction::RemoveMember => "remove_member",
        }
    }

    /// Resource-wide action which covers this action on every role.
    pub fn blanket(&self) -> Action {
        match self {
            RoleAction::AddMember => Action::AddRoles,
            RoleAction::RemoveMember => Action::RemoveRoles,
        }
    }

    pub fn describe(&self, role: &RoleId) -> String {
        match self {
            RoleAction::AddMember => format!("Add users to role {role}"),
            RoleAction::RemoveMember => format!("Remove users from role {role}"),
        }
    }
}

impl Display for RoleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RoleAction {
    type Err = PermissionNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        RoleAction::ALL
            .into_iter()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| PermissionNameError::UnknownAction(value.to_string()))
    }
}

/// Where a permission applies inside a resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PermissionScope {
    Resource(Action),
    Role(RoleId, RoleAction),
}

/// Name of a permission, serialized as `org<resource>:<action>` or
/// `org<resource>:role<role>:<role-action>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionName {
    pub resource: Id,
    pub scope: PermissionScope,
}

impl PermissionName {
    /// Resource-wide permission.
    pub fn resource(resource: &Id, action: Action) -> Self {
        Self {
            resource: resource.clone(),
            scope: PermissionScope::Resource(action),
        }
    }

    /// Permission scoped to a single role of the resource.
    pub fn role(resource: &Id, role: &RoleId, action: RoleAction) -> Self {
        Self {
            resource: resource.clone(),
            scope: PermissionScope::Role(role.clone(), action),
        }
    }

    /// Resource-wide action, `None` for role-scoped permissions.
    pub fn action(&self) -> Option<Action> {
        match self.scope {
            PermissionScope::Resource(action) => Some(action),
            PermissionScope::Role(_, _) => None,
        }
    }
}

impl Display for PermissionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            PermissionScope::Resource(action) => {
                write!(f, "{RESOURCE_PREFIX}{}:{action}", self.resource)
            }
            PermissionScope::Role(role, action) => {
                write!(f, "{RESOURCE_PREFIX}{}:{ROLE_PREFIX}{role}:{action}", self.resource)
            }
        }
    }
}

impl FromStr for PermissionName {
    type Err = PermissionNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = value.split(NAMESPACE_SEPARATOR).collect();
        match segments.as_slice() {
            [resource, action] => Ok(Self::resource(&parse_resource(resource)?, action.parse()?)),
            [resource, role, action] => Ok(Self::role(
                &parse_resource(resource)?,
                &parse_role(role)?,
                action.parse()?,
            )),
            _ => Err(PermissionNameError::Malformed(value.to_string())),
        }
    }
}

impl TryFrom<String> for PermissionName {
    type Error = PermissionNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PermissionName> for String {
    fn from(name: PermissionName) -> Self {
        name.to_string()
    }
}

/// Label of the role every owner of a resource holds.
pub const OWNER_LABEL: &str = "owner";

/// Label of the role every member of a resource holds.
pub const MEMBER_LABEL: &str = "member";

/// Label of the delegation role carrying the permissions scoped to another role.
pub const MANAGER_LABEL: &str = "manager";

/// Name of a role, serialized as `org<resource>:<label>` or `org<resource>:role<role>:<label>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleName {
    pub resource: Id,
    pub role: Option<RoleId>,
    pub label: String,
}

impl RoleName {
    pub fn new(resource: &Id, label: &str) -> Result<Self, PermissionNameError> {
        validate_label(label)?;
        Ok(Self {
            resource: resource.clone(),
            role: None,
            label: label.to_string(),
        })
    }

    pub fn owner(resource: &Id) -> Self {
        Self {
            resource: resource.clone(),
            role: None,
            label: OWNER_LABEL.to_string(),
        }
    }

    pub fn member(resource: &Id) -> Self {
        Self {
            resource: resource.clone(),
            role: None,
            label: MEMBER_LABEL.to_string(),
        }
    }

    /// Delegation role holding the permissions scoped to `role`.
    pub fn manager(resource: &Id, role: &RoleId) -> Self {
        Self {
            resource: resource.clone(),
            role: Some(role.clone()),
            label: MANAGER_LABEL.to_string(),
        }
    }

    /// Prefix shared by every role and permission name of a resource.
    pub fn prefix(resource: &Id) -> String {
        format!("{RESOURCE_PREFIX}{resource}{NAMESPACE_SEPARATOR}")
    }

    /// Returns true for the roles every resource is provisioned with.
    pub fn is_builtin(&self) -> bool {
        self.role.is_none() && (self.label == OWNER_LABEL || self.label == MEMBER_LABEL)
    }
}

impl Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.role {
            Some(role) => write!(
                f,
                "{RESOURCE_PREFIX}{}:{ROLE_PREFIX}{role}:{}",
                self.resource, self.label
            ),
            None => write!(f, "{RESOURCE_PREFIX}{}:{}", self.resource, self.label),
        }
    }
}

impl FromStr for RoleName {
    type Err = PermissionNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = value.split(NAMESPACE_SEPARATOR).collect();
        match segments.as_slice() {
            [resource, label] if !label.is_empty() => Ok(Self {
                resource: parse_resource(resource)?,
                role: None,
                label: label.to_string(),
            }),
            [resource, role, label] if !label.is_empty() => Ok(Self {
                resource: parse_resource(resource)?,
                role: Some(parse_role(role)?),
                label: label.to_string(),
            }),
            _ => Err(PermissionNameError::Malformed(value.to_string())),
        }
    }
}

impl TryFrom<String> for RoleName {
    type Error = PermissionNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoleName> for String {
    fn from(name: RoleName) -> Self {
        name.to_string()
    }
}

/// Checks a user-chosen role label.
///
/// Labels can't collide with the built-in roles nor with the segment announcing role-scoped names.
pub fn validate_label(label: &str) -> Result<(), PermissionNameError> {
    if label.trim().is_empty() {
        return Err(PermissionNameError::InvalidLabel(label.to_string()));
    }

    if label.contains(NAMESPACE_SEPARATOR)
        || label == OWNER_LABEL
        || label == MEMBER_LABEL
        || label.starts_with(ROLE_PREFIX)
    {
        return Err(PermissionNameError::ReservedLabel(label.to_string()));
    }

    Ok(())
}

fn parse_resource(segment: &str) -> Result<Id, PermissionNameError> {
    let id = segment
        .strip_prefix(RESOURCE_PREFIX)
        .ok_or_else(|| PermissionNameError::MissingPrefix(RESOURCE_PREFIX, segment.to_string()))?;
    Ok(id.parse()?)
}

fn parse_role(segment: &str) -> Result<RoleId, PermissionNameError> {
    let id = segment
        .strip_prefix(ROLE_PREFIX)
        .ok_or_else(|| PermissionNameError::MissingPrefix(ROLE_PREFIX, segment.to_string()))?;
    Ok(id.parse()?)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionNameError {
    #[error("malformed name '{0}'")]
    Malformed(String),

    #[error("expected prefix '{0}' in segment '{1}'")]
    MissingPrefix(&'static str, String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("invalid role label '{0}'")]
    InvalidLabel(String),

    #[error("role label '{0}' is reserved")]
    ReservedLabel(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}
