// SPDX-License-Identifier: MIT OR Apache-2.0

use sqlx::{FromRow, query, query_as};
use taskboard_core::{Board, Id, IdentityError, Organization, ResourceFields};

use crate::resources::ResourceStore;
use crate::sqlite::{SqliteError, SqliteStore};

impl<'a> ResourceStore for SqliteStore<'a> {
    async fn insert_organization(&self, organization: &Organization) -> Result<(), Self::Error> {
        self.tx(async |tx| {
            query(
                "
                INSERT INTO
                    organizations_v1 (
                        id,
                        owner_id,
                        name,
                        description
                    )
                VALUES
                    (?, ?, ?, ?)
                ",
            )
            .bind(organization.id.as_str())
            .bind(organization.owner_id.as_str())
            .bind(organization.name.as_str())
            .bind(organization.description.as_deref())
            .execute(&mut **tx)
            .await?;
            Ok(())
        })
        .await
    }

    async fn get_organization(&self, id: &Id) -> Result<Option<Organization>, Self::Error> {
        let row = self
            .tx(async |tx| {
                query_as::<_, OrganizationRow>(
                    "
                    SELECT
                        id,
                        owner_id,
                        name,
                        description
                    FROM
                        organizations_v1
                    WHERE
                        id = ?
                    ",
                )
                .bind(id.as_str())
                .fetch_optional(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        row.map(Organization::try_from).transpose()
    }

    async fn update_organization(
        &self,
        id: &Id,
        fields: &ResourceFields,
    ) -> Result<bool, Self::Error> {
        self.tx(async |tx| {
            let result = query(
                "
                UPDATE
                    organizations_v1
                SET
                    name = ?,
                    description = ?
                WHERE
                    id = ?
                ",
            )
            .bind(fields.name.as_str())
            .bind(fields.description.as_deref())
            .bind(id.as_str())
            .execute(&mut **tx)
            .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn delete_organization(&self, id: &Id) -> Result<bool, Self::Error> {
        self.tx(async |tx| {
            let result = query(
                "
                DELETE FROM
                    organizations_v1
                WHERE
                    id = ?
                ",
            )
            .bind(id.as_str())
            .execute(&mut **tx)
            .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn insert_board(&self, board: &Board) -> Result<(), Self::Error> {
        self.tx(async |tx| {
            query(
                "
                INSERT INTO
                    boards_v1 (
                        id,
                        owner_id,
                        name,
                        description,
                        is_private
                    )
                VALUES
                    (?, ?, ?, ?, ?)
                ",
            )
            .bind(board.id.as_str())
            .bind(board.owner_id.as_str())
            .bind(board.name.as_str())
            .bind(board.description.as_deref())
            .bind(board.is_private)
            .execute(&mut **tx)
            .await?;
            Ok(())
        })
        .await
    }

    async fn get_board(&self, id: &Id) -> Result<Option<Board>, Self::Error> {
        let row = self
            .tx(async |tx| {
                query_as::<_, BoardRow>(
                    "
                    SELECT
                        id,
                        owner_id,
                        name,
                        description,
                        is_private
                    FROM
                        boards_v1
                    WHERE
                        id = ?
                    ",
                )
                .bind(id.as_str())
                .fetch_optional(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;

        row.map(Board::try_from).transpose()
    }

    async fn update_board(
        &self,
        id: &Id,
        fields: &ResourceFields,
        is_private: bool,
    ) -> Result<bool, Self::Error> {
        self.tx(async |tx| {
            let result = query(
                "
                UPDATE
                    boards_v1
                SET
                    name = ?,
                    description = ?,
                    is_private = ?
                WHERE
                    id = ?
                ",
            )
            .bind(fields.name.as_str())
            .bind(fields.description.as_deref())
            .bind(is_private)
            .bind(id.as_str())
            .execute(&mut **tx)
            .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn delete_board(&self, id: &Id) -> Result<bool, Self::Error> {
        // Panels, stacks and cards of the board are deleted by the "ON DELETE CASCADE" foreign
        // key constraints.
        self.tx(async |tx| {
            let result = query(
                "
                DELETE FROM
                    boards_v1
                WHERE
                    id = ?
                ",
            )
            .bind(id.as_str())
            .execute(&mut **tx)
            .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }
}

#[derive(Debug, FromRow)]
struct OrganizationRow {
    id: String,
    owner_id: String,
    name: String,
    description: Option<String>,
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = SqliteError;

    fn try_from(row: OrganizationRow) -> Result<Self, Self::Error> {
        Ok(Organization {
            id: row
                .id
                .parse()
                .map_err(|err: IdentityError| SqliteError::Decode("id".into(), err.into()))?,
            owner_id: row.owner_id.parse().map_err(|err: IdentityError| {
                SqliteError::Decode("owner_id".into(), err.into())
            })?,
            name: row.name,
            description: row.description,
        })
    }
}

#[derive(Debug, FromRow)]
struct BoardRow {
    id: String,
    owner_id: String,
    name: String,
    description: Option<String>,
    is_private: bool,
}

impl TryFrom<BoardRow> for Board {
    type Error = SqliteError;

    fn try_from(row: BoardRow) -> Result<Self, Self::Error> {
        Ok(Board {
            id: row
                .id
                .parse()
                .map_err(|err: IdentityError| SqliteError::Decode("id".into(), err.into()))?,
            owner_id: row.owner_id.parse().map_err(|err: IdentityError| {
                SqliteError::Decode("owner_id".into(), err.into())
            })?,
            name: row.name,
            description: row.description,
            is_private: row.is_private,
        })
    }
}
