// SPDX-License-Identifier: MIT OR Apache-2.0

use std::ops::RangeInclusive;

use taskboard_core::{Id, ItemFields, ItemKind, OrderedItem, Position, ScopeKind};

use crate::traits::Transaction;

/// Storage primitives for items ordered by position inside a parent scope.
///
/// Every method runs inside the transaction started with `Transaction::begin`. The primitives
/// don't maintain the density of positions on their own, see `Positions` for the operations
/// combining them into consistent create, move and delete steps.
pub trait PositionStore: Transaction {
    /// Get an item by id.
    fn get_item(
        &self,
        kind: ItemKind,
        id: &Id,
    ) -> impl Future<Output = Result<Option<OrderedItem>, Self::Error>>;

    /// Get all items of a scope, sorted by position.
    fn get_items(
        &self,
        kind: ItemKind,
        scope: &Id,
    ) -> impl Future<Output = Result<Vec<OrderedItem>, Self::Error>>;

    /// Highest position of all items in a scope or `None` if the scope is empty.
    fn max_position(
        &self,
        kind: ItemKind,
        scope: &Id,
    ) -> impl Future<Output = Result<Option<Position>, Self::Error>>;

    /// Returns `true` if the scope (board, panel or stack) exists.
    fn has_scope(
        &self,
        kind: ScopeKind,
        scope: &Id,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Insert an item with the position it carries.
    fn insert_item(&self, item: &OrderedItem) -> impl Future<Output = Result<(), Self::Error>>;

    /// Overwrite title and description of an item.
    ///
    /// Returns `true` when the item was found.
    fn update_fields(
        &self,
        kind: ItemKind,
        id: &Id,
        fields: &ItemFields,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Set the position of a single item.
    ///
    /// Returns `true` when the item was found.
    fn set_position(
        &self,
        kind: ItemKind,
        id: &Id,
        position: Position,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Add `delta` to the position of every item of the scope with a position inside `range`.
    ///
    /// Returns the number of shifted items.
    fn shift_positions(
        &self,
        kind: ItemKind,
        scope: &Id,
        range: RangeInclusive<Position>,
        delta: i64,
    ) -> impl Future<Output = Result<u64, Self::Error>>;

    /// Remove an item together with all items using it as their scope.
    ///
    /// Returns `true` when the item was found.
    fn remove_item(
        &self,
        kind: ItemKind,
        id: &Id,
    ) -> impl Future<Output = Result<bool, Self::Error>>;
}
