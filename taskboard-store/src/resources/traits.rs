// SPDX-License-Identifier: MIT OR Apache-2.0

use taskboard_core::{Board, Id, Organization, ResourceFields};

use crate::traits::Transaction;

/// Interface for storing, updating and deleting organizations and boards.
///
/// Every method runs inside the transaction started with `Transaction::begin`. Roles and
/// permissions of a resource are held by the external authority and not part of this store.
pub trait ResourceStore: Transaction {
    /// Insert an organization.
    fn insert_organization(
        &self,
        organization: &Organization,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Get an organization by id.
    fn get_organization(
        &self,
        id: &Id,
    ) -> impl Future<Output = Result<Option<Organization>, Self::Error>>;

    /// Overwrite name and description of an organization.
    ///
    /// Returns `true` when the organization was found.
    fn update_organization(
        &self,
        id: &Id,
        fields: &ResourceFields,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Delete an organization.
    ///
    /// Returns `true` when the removal occurred and `false` when the organization was not found.
    fn delete_organization(&self, id: &Id) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Insert a board.
    fn insert_board(&self, board: &Board) -> impl Future<Output = Result<(), Self::Error>>;

    /// Get a board by id.
    fn get_board(&self, id: &Id) -> impl Future<Output = Result<Option<Board>, Self::Error>>;

    /// Overwrite name, description and visibility of a board.
    ///
    /// Returns `true` when the board was found.
    fn update_board(
        &self,
        id: &Id,
        fields: &ResourceFields,
        is_private: bool,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Delete a board together with all its panels, stacks and cards.
    ///
    /// Returns `true` when the removal occurred and `false` when the board was not found.
    fn delete_board(&self, id: &Id) -> impl Future<Output = Result<bool, Self::Error>>;
}
