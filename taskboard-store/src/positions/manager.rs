// SPDX-License-Identifier: MIT OR Apache-2.0

use std::cmp::Ordering;
use std::error::Error;

use taskboard_core::{
    Id, ItemError, ItemFields, ItemKind, ItemUpdate, OrderedItem, Position, ScopeKind,
};
use thiserror::Error;
use tracing::debug;

use crate::positions::PositionStore;
use crate::traits::atomically;

/// Keeps the positions of sibling items dense while they get created, moved and deleted.
///
/// Each operation runs inside its own transaction: reading the current state of the scope,
/// validating the request against it and shifting siblings either happens completely or not at
/// all. As transactions are serialized by the store, concurrent requests against the same scope
/// can never observe or produce gaps or duplicate positions.
#[derive(Clone, Debug)]
pub struct Positions<S> {
    store: S,
}

impl<S> Positions<S>
where
    S: PositionStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Appends a new item to the end of the scope.
    ///
    /// The item is placed at the highest position of the scope plus one, or at 0 for an empty
    /// scope.
    pub async fn create(
        &self,
        kind: ItemKind,
        scope: &Id,
        fields: ItemFields,
    ) -> Result<OrderedItem, PositionError<S::Error>> {
        fields.validate().map_err(PositionError::InvalidFields)?;

        atomically(&self.store, async |store: &S| {
            if !store.has_scope(kind.scope(), scope).await? {
                return Err(PositionError::ScopeNotFound(kind.scope(), scope.clone()));
            }

            let position = store
                .max_position(kind, scope)
                .await?
                .map_or(0, |max| max + 1);

            let item = OrderedItem {
                id: Id::new(),
                kind,
                scope: scope.clone(),
                position,
                fields,
            };
            store.insert_item(&item).await?;

            debug!(%kind, id = %item.id, %scope, position, "created item");
            Ok(item)
        })
        .await
    }

    /// Moves an item to a new position inside its scope.
    pub async fn move_to(
        &self,
        kind: ItemKind,
        id: &Id,
        position: Position,
    ) -> Result<OrderedItem, PositionError<S::Error>> {
        self.update(kind, id, ItemUpdate::position(position)).await
    }

    /// Applies field changes and an optional move to an item in one transaction.
    ///
    /// Moving an item later decrements all siblings between the old (exclusive) and new position
    /// (inclusive), moving it earlier increments all siblings between the new (inclusive) and old
    /// position (exclusive). The target is validated against the current highest position of the
    /// scope, read inside the same transaction.
    pub async fn update(
        &self,
        kind: ItemKind,
        id: &Id,
        update: ItemUpdate,
    ) -> Result<OrderedItem, PositionError<S::Error>> {
        if let Some(fields) = &update.fields {
            fields.validate().map_err(PositionError::InvalidFields)?;
        }

        atomically(&self.store, async |store: &S| {
            let mut item = store
                .get_item(kind, id)
                .await?
                .ok_or_else(|| PositionError::NotFound(kind, id.clone()))?;

            if let Some(fields) = update.fields {
                store.update_fields(kind, id, &fields).await?;
                item.fields = fields;
            }

            let Some(target) = update.position else {
                return Ok(item);
            };

            // The scope contains at least the item itself.
            let max = store.max_position(kind, &item.scope).await?.unwrap_or(0);
            if target < 0 || target > max {
                return Err(PositionError::OutOfRange {
                    position: target,
                    max,
                });
            }

            let shifted = match target.cmp(&item.position) {
                Ordering::Equal => return Ok(item),
                Ordering::Greater => {
                    store
                        .shift_positions(kind, &item.scope, item.position + 1..=target, -1)
                        .await?
                }
                Ordering::Less => {
                    store
                        .shift_positions(kind, &item.scope, target..=item.position - 1, 1)
                        .await?
                }
            };
            store.set_position(kind, id, target).await?;

            debug!(
                %kind,
                %id,
                from = item.position,
                to = target,
                shifted,
                "moved item"
            );

            item.position = target;
            Ok(item)
        })
        .await
    }

    /// Deletes an item and closes the gap it leaves behind.
    ///
    /// All items ordered inside the deleted item are removed as well.
    pub async fn delete(&self, kind: ItemKind, id: &Id) -> Result<(), PositionError<S::Error>> {
        atomically(&self.store, async |store: &S| {
            let item = store
                .get_item(kind, id)
                .await?
                .ok_or_else(|| PositionError::NotFound(kind, id.clone()))?;

            store.remove_item(kind, id).await?;
            let shifted = store
                .shift_positions(kind, &item.scope, item.position + 1..=Position::MAX, -1)
                .await?;

            debug!(%kind, %id, position = item.position, shifted, "deleted item");
            Ok(())
        })
        .await
    }

    /// Get an item by id.
    pub async fn get(
        &self,
        kind: ItemKind,
        id: &Id,
    ) -> Result<OrderedItem, PositionError<S::Error>> {
        atomically(&self.store, async |store: &S| {
            store
                .get_item(kind, id)
                .await?
                .ok_or_else(|| PositionError::NotFound(kind, id.clone()))
        })
        .await
    }

    /// Get all items of a scope in their order.
    pub async fn list(
        &self,
        kind: ItemKind,
        scope: &Id,
    ) -> Result<Vec<OrderedItem>, PositionError<S::Error>> {
        atomically(&self.store, async |store: &S| {
            if !store.has_scope(kind.scope(), scope).await? {
                return Err(PositionError::ScopeNotFound(kind.scope(), scope.clone()));
            }
            Ok(store.get_items(kind, scope).await?)
        })
        .await
    }
}

#[derive(Debug, Error)]
pub enum PositionError<E> {
    /// Target position lies outside of `0..=max` of the scope.
    #[error("position {position} is out of range, expected 0 to {max}")]
    OutOfRange { position: Position, max: Position },

    #[error(transparent)]
    InvalidFields(ItemError),

    #[error("{0} {1} not found")]
    NotFound(ItemKind, Id),

    #[error("{0} {1} not found")]
    ScopeNotFound(ScopeKind, Id),

    /// Persistence failed, no changes were applied.
    #[error(transparent)]
    Store(E),
}

impl<E: Error> From<E> for PositionError<E> {
    fn from(err: E) -> Self {
        PositionError::Store(err)
    }
}
