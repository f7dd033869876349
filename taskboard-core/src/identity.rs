// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opaque identifiers of stored records, external users and external roles.
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ID_LENGTH: usize = 16;

/// Separator of the external authority's flat role and permission namespace. Identifiers are
/// embedded into that namespace and can therefore never contain it.
pub(crate) const NAMESPACE_SEPARATOR: char = ':';

/// Identifier of organizations, boards, panels, stacks and cards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id(String);

impl Id {
    /// Generates a new random identifier using the thread-local CSPRNG.
    pub fn new() -> Self {
        let bytes: [u8; ID_LENGTH] = rand::random();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Id {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        validate_segment(value)?;
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for Id {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_segment(&value)?;
        Ok(Self(value))
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.0
    }
}

/// Identifier of a user as issued by the external authority, for example `auth0|5f7c8ec7`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Err(IdentityError::Empty);
        }
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for UserId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// Identifier of a role as issued by the external authority, for example `rol_3xB9kPq`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleId(String);

impl RoleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoleId {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        validate_segment(value)?;
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for RoleId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_segment(&value)?;
        Ok(Self(value))
    }
}

impl From<RoleId> for String {
    fn from(id: RoleId) -> Self {
        id.0
    }
}

fn validate_segment(value: &str) -> Result<(), IdentityError> {
    if value.trim().is_empty() {
        return Err(IdentityError::Empty);
    }

    if value.contains(NAMESPACE_SEPARATOR) {
        return Err(IdentityError::Separator(value.to_string()));
    }

    Ok(())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identifier can not be empty")]
    Empty,

    #[error("identifier '{0}' contains reserved separator ':'")]
    Separator(String),
}

#[cfg(test)]
mod tests {
    use super::{Id, IdentityError, RoleId, UserId};

    #[test]
    fn random_ids_are_hex_encoded() {
        let id = Id::new();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(Id::new(), id);
    }

    #[test]
    fn reject_separator_and_empty_values() {
        assert_eq!("".parse::<Id>(), Err(IdentityError::Empty));
        assert_eq!(
            "org1:read".parse::<Id>(),
            Err(IdentityError::Separator("org1:read".into()))
        );
        assert!("rol_123:x".parse::<RoleId>().is_err());

        // User ids of the authority commonly contain "|" but never need to be embedded.
        assert!("auth0|5f7c8ec7".parse::<UserId>().is_ok());
        assert!(" ".parse::<UserId>().is_err());
    }

    #[test]
    fn serde_validates_on_decode() {
        let id: Id = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(id.to_string(), "42");
        assert!(serde_json::from_str::<Id>("\"a:b\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"42\"");
    }
}
