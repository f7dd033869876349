// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use taskboard_auth::{ProvisionError, ResolveError, RoleError};
use taskboard_core::{ItemError, PermissionName, ResourceError};
use taskboard_store::{PositionError, SqliteError};
use thiserror::Error;

type BoxedError = Box<dyn Error + Send + Sync + 'static>;

/// Error returned by all operations of the `Service`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bad input, for example an empty title or a position outside of the scope.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The user is missing the permission to run the operation.
    #[error("missing permission '{0}'")]
    Authorization(PermissionName),

    #[error("{0} not found")]
    NotFound(String),

    /// Storage or authority failed. Nothing was changed by the operation.
    #[error("failed to {operation}: {source}")]
    Dependency {
        operation: &'static str,
        source: BoxedError,
    },

    /// The authority failed in the middle of provisioning a resource and was left with some of
    /// its roles or permissions. Needs manual cleanup.
    #[error(transparent)]
    PartialProvisioning(BoxedError),
}

impl ServiceError {
    pub(crate) fn dependency<E>(operation: &'static str, err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        ServiceError::Dependency {
            operation,
            source: Box::new(err),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::Authorization(_) => ErrorKind::Authorization,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Dependency { .. } => ErrorKind::Dependency,
            ServiceError::PartialProvisioning(_) => ErrorKind::PartialProvisioning,
        }
    }
}

/// Category of a `ServiceError`, as reported to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Dependency,
    PartialProvisioning,
}

impl ErrorKind {
    /// Equivalent HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Authorization => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Dependency | ErrorKind::PartialProvisioning => 500,
        }
    }

    /// Returns false for errors which can't be fixed by repeating the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Dependency)
    }
}

impl From<SqliteError> for ServiceError {
    fn from(err: SqliteError) -> Self {
        ServiceError::dependency("access store", err)
    }
}

impl From<ItemError> for ServiceError {
    fn from(err: ItemError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<ResourceError> for ServiceError {
    fn from(err: ResourceError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<PositionError<SqliteError>> for ServiceError {
    fn from(err: PositionError<SqliteError>) -> Self {
        match err {
            PositionError::OutOfRange { .. } | PositionError::InvalidFields(_) => {
                ServiceError::Validation(err.to_string())
            }
            PositionError::NotFound(kind, id) => ServiceError::NotFound(format!("{kind} {id}")),
            PositionError::ScopeNotFound(kind, id) => {
                ServiceError::NotFound(format!("{kind} {id}"))
            }
            PositionError::Store(err) => ServiceError::dependency("update positions", err),
        }
    }
}

impl<E> From<ResolveError<E>> for ServiceError
where
    E: Error + Send + Sync + 'static,
{
    fn from(err: ResolveError<E>) -> Self {
        ServiceError::dependency("resolve permissions", err)
    }
}

impl<E> From<ProvisionError<E>> for ServiceError
where
    E: Error + Send + Sync + 'static,
{
    fn from(err: ProvisionError<E>) -> Self {
        if err.is_partial() {
            ServiceError::PartialProvisioning(Box::new(err))
        } else {
            ServiceError::dependency("provision roles", err)
        }
    }
}

impl<E> From<RoleError<E>> for ServiceError
where
    E: Error + Send + Sync + 'static,
{
    fn from(err: RoleError<E>) -> Self {
        match err {
            RoleError::InvalidLabel(_) | RoleError::Protected(_) => {
                ServiceError::Validation(err.to_string())
            }
            RoleError::UnknownRole(_, _) | RoleError::MissingRole(_) => {
                ServiceError::NotFound(err.to_string())
            }
            RoleError::Authority(_, _) => ServiceError::dependency("manage roles", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use taskboard_core::{Action, Id, ItemKind, PermissionName, ScopeKind};
    use taskboard_store::{PositionError, SqliteError};

    use super::{ErrorKind, ServiceError};

    #[test]
    fn status_codes() {
        let cases: [(ServiceError, u16); 5] = [
            (
                PositionError::<SqliteError>::OutOfRange {
                    position: 5,
                    max: 2,
                }
                .into(),
                400,
            ),
            (
                ServiceError::Authorization(PermissionName::resource(&Id::new(), Action::Update)),
                403,
            ),
            (
                PositionError::<SqliteError>::NotFound(ItemKind::Card, Id::new()).into(),
                404,
            ),
            (
                PositionError::<SqliteError>::ScopeNotFound(ScopeKind::Board, Id::new()).into(),
                404,
            ),
            (SqliteError::TransactionMissing.into(), 500),
        ];

        for (err, status) in cases {
            assert_eq!(err.kind().status_code(), status, "{err}");
        }
        assert!(ErrorKind::Dependency.is_retryable());
        assert!(!ErrorKind::PartialProvisioning.is_retryable());
        assert_eq!(ErrorKind::PartialProvisioning.status_code(), 500);
    }
}
