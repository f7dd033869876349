// SPDX-License-Identifier: MIT OR Apache-2.0

use std::ops::RangeInclusive;

use taskboard_core::{Id, ItemFields, ItemKind, OrderedItem, Position, ScopeKind};

use crate::memory::MemoryStore;
use crate::positions::PositionStore;

impl PositionStore for MemoryStore {
    async fn get_item(
        &self,
        kind: ItemKind,
        id: &Id,
    ) -> Result<Option<OrderedItem>, Self::Error> {
        self.read(|inner| inner.items(kind).find(|item| &item.id == id).cloned())
    }

    async fn get_items(
        &self,
        kind: ItemKind,
        scope: &Id,
    ) -> Result<Vec<OrderedItem>, Self::Error> {
        self.read(|inner| {
            let mut items: Vec<OrderedItem> = inner
                .items(kind)
                .filter(|item| &item.scope == scope)
                .cloned()
                .collect();
            items.sort_by_key(|item| item.position);
            items
        })
    }

    async fn max_position(
        &self,
        kind: ItemKind,
        scope: &Id,
    ) -> Result<Option<Position>, Self::Error> {
        self.read(|inner| {
            inner
                .items(kind)
                .filter(|item| &item.scope == scope)
                .map(|item| item.position)
                .max()
        })
    }

    async fn has_scope(&self, kind: ScopeKind, scope: &Id) -> Result<bool, Self::Error> {
        self.read(|inner| match kind.as_item() {
            Some(item_kind) => inner.items(item_kind).any(|item| &item.id == scope),
            None => inner.boards.contains_key(scope),
        })
    }

    async fn insert_item(&self, item: &OrderedItem) -> Result<(), Self::Error> {
        self.write(|inner| {
            inner
                .items_mut(item.kind)
                .insert(item.id.clone(), item.clone());
        })
    }

    async fn update_fields(
        &self,
        kind: ItemKind,
        id: &Id,
        fields: &ItemFields,
    ) -> Result<bool, Self::Error> {
        self.write(|inner| match inner.items_mut(kind).get_mut(id) {
            Some(item) => {
                item.fields = fields.clone();
                true
            }
            None => false,
        })
    }

    async fn set_position(
        &self,
        kind: ItemKind,
        id: &Id,
        position: Position,
    ) -> Result<bool, Self::Error> {
        self.write(|inner| match inner.items_mut(kind).get_mut(id) {
            Some(item) => {
                item.position = position;
                true
            }
            None => false,
        })
    }

    async fn shift_positions(
        &self,
        kind: ItemKind,
        scope: &Id,
        range: RangeInclusive<Position>,
        delta: i64,
    ) -> Result<u64, Self::Error> {
        self.write(|inner| {
            let mut shifted = 0;
            for item in inner.items_mut(kind).values_mut() {
                if &item.scope == scope && range.contains(&item.position) {
                    item.position += delta;
                    shifted += 1;
                }
            }
            shifted
        })
    }

    async fn remove_item(&self, kind: ItemKind, id: &Id) -> Result<bool, Self::Error> {
        self.write(|inner| {
            let removed = inner.items_mut(kind).remove(id).is_some();
            if removed {
                inner.remove_children(kind, id);
            }
            removed
        })
    }
}
