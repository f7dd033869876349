// SPDX-License-Identifier: MIT OR Apache-2.0

use taskboard_core::{Board, Id, ItemKind, Organization, ResourceFields};

use crate::memory::MemoryStore;
use crate::resources::ResourceStore;

impl ResourceStore for MemoryStore {
    async fn insert_organization(&self, organization: &Organization) -> Result<(), Self::Error> {
        self.write(|inner| {
            inner
                .organizations
                .insert(organization.id.clone(), organization.clone());
        })
    }

    async fn get_organization(&self, id: &Id) -> Result<Option<Organization>, Self::Error> {
        self.read(|inner| inner.organizations.get(id).cloned())
    }

    async fn update_organization(
        &self,
        id: &Id,
        fields: &ResourceFields,
    ) -> Result<bool, Self::Error> {
        self.write(|inner| match inner.organizations.get_mut(id) {
            Some(organization) => {
                organization.name = fields.name.clone();
                organization.description = fields.description.clone();
                true
            }
            None => false,
        })
    }

    async fn delete_organization(&self, id: &Id) -> Result<bool, Self::Error> {
        self.write(|inner| inner.organizations.remove(id).is_some())
    }

    async fn insert_board(&self, board: &Board) -> Result<(), Self::Error> {
        self.write(|inner| {
            inner.boards.insert(board.id.clone(), board.clone());
        })
    }

    async fn get_board(&self, id: &Id) -> Result<Option<Board>, Self::Error> {
        self.read(|inner| inner.boards.get(id).cloned())
    }

    async fn update_board(
        &self,
        id: &Id,
        fields: &ResourceFields,
        is_private: bool,
    ) -> Result<bool, Self::Error> {
        self.write(|inner| match inner.boards.get_mut(id) {
            Some(board) => {
                board.name = fields.name.clone();
                board.description = fields.description.clone();
                board.is_private = is_private;
                true
            }
            None => false,
        })
    }

    async fn delete_board(&self, id: &Id) -> Result<bool, Self::Error> {
        self.write(|inner| {
            if inner.boards.remove(id).is_none() {
                return false;
            }

            let panels: Vec<Id> = inner
                .items(ItemKind::Panel)
                .filter(|panel| &panel.scope == id)
                .map(|panel| panel.id.clone())
                .collect();

            for panel in panels {
                inner.items_mut(ItemKind::Panel).remove(&panel);
                inner.remove_children(ItemKind::Panel, &panel);
            }

            true
        })
    }
}
