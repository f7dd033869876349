// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

/// Traits to implement database transaction provider.
///
/// To guard against sharing transactions unknowingly across unrelated database queries, a concept
/// of a "permit" was introduced which does not protect from misuse but helps to make "holding" a
/// transaction explicit.
///
/// All store interfaces of this crate (`PositionStore`, `ResourceStore`) run their queries inside
/// the transaction which was started with `begin`.
pub trait Transaction {
    type Error: Error;

    type Permit;

    /// Begins a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Permit, Self::Error>>;

    /// Rolls back the transaction and with that all uncommitted changes.
    fn rollback(&self, permit: Self::Permit) -> impl Future<Output = Result<(), Self::Error>>;

    /// Commits the transaction.
    fn commit(&self, permit: Self::Permit) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Runs `f` inside a transaction.
///
/// The transaction is committed when `f` succeeds and rolled back when it fails, in which case the
/// error of `f` is returned. A failing rollback is logged and does not replace that error.
pub async fn atomically<S, F, R, E>(store: &S, f: F) -> Result<R, E>
where
    S: Transaction,
    F: AsyncFnOnce(&S) -> Result<R, E>,
    E: From<S::Error>,
{
    let permit = store.begin().await?;

    match f(store).await {
        Ok(result) => {
            store.commit(permit).await?;
            Ok(result)
        }
        Err(err) => {
            if let Err(rollback_err) = store.rollback(permit).await {
                tracing::warn!("failed rolling back transaction: {rollback_err}");
            }
            Err(err)
        }
    }
}
