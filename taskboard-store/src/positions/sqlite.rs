// SPDX-License-Identifier: MIT OR Apache-2.0

use std::ops::RangeInclusive;

use sqlx::{FromRow, query, query_as};
use taskboard_core::{
    Id, IdentityError, ItemFields, ItemKind, OrderedItem, Position, ScopeKind,
};

use crate::positions::PositionStore;
use crate::sqlite::{DecodeError, SqliteError, SqliteStore};

fn table(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Panel => "panels_v1",
        ItemKind::Stack => "stacks_v1",
        ItemKind::Card => "cards_v1",
    }
}

fn scope_column(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Panel => "board_id",
        ItemKind::Stack => "panel_id",
        ItemKind::Card => "stack_id",
    }
}

fn scope_table(kind: ScopeKind) -> &'static str {
    match kind {
        ScopeKind::Board => "boards_v1",
        ScopeKind::Panel => table(ItemKind::Panel),
        ScopeKind::Stack => table(ItemKind::Stack),
    }
}

impl<'a> PositionStore for SqliteStore<'a> {
    async fn get_item(
        &self,
        kind: ItemKind,
        id: &Id,
    ) -> Result<Option<OrderedItem>, Self::Error> {
        let sql = format!(
            "
            SELECT
                id,
                {scope} AS scope_id,
                position,
                title,
                description
            FROM
                {table}
            WHERE
                id = ?
            ",
            scope = scope_column(kind),
            table = table(kind),
        );

        let row = self
            .tx(async |tx| {
                query_as::<_, ItemRow>(&sql)
                    .bind(id.as_str())
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(SqliteError::Sqlite)
            })
            .await?;

        row.map(|row| row.into_item(kind)).transpose()
    }

    async fn get_items(
        &self,
        kind: ItemKind,
        scope: &Id,
    ) -> Result<Vec<OrderedItem>, Self::Error> {
        let sql = format!(
            "
            SELECT
                id,
                {scope} AS scope_id,
                position,
                title,
                description
            FROM
                {table}
            WHERE
                {scope} = ?
            ORDER BY
                position ASC
            ",
            scope = scope_column(kind),
            table = table(kind),
        );

        let rows = self
            .tx(async |tx| {
                query_as::<_, ItemRow>(&sql)
                    .bind(scope.as_str())
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(SqliteError::Sqlite)
            })
            .await?;

        rows.into_iter().map(|row| row.into_item(kind)).collect()
    }

    async fn max_position(
        &self,
        kind: ItemKind,
        scope: &Id,
    ) -> Result<Option<Position>, Self::Error> {
        let sql = format!(
            "
            SELECT
                MAX(position)
            FROM
                {table}
            WHERE
                {scope} = ?
            ",
            scope = scope_column(kind),
            table = table(kind),
        );

        self.tx(async |tx| {
            // This returns NULL if no rows are in the scope.
            let max: (Option<i64>,) = query_as(&sql)
                .bind(scope.as_str())
                .fetch_one(&mut **tx)
                .await?;
            Ok(max.0)
        })
        .await
    }

    async fn has_scope(&self, kind: ScopeKind, scope: &Id) -> Result<bool, Self::Error> {
        let sql = format!(
            "
            SELECT
                1
            FROM
                {table}
            WHERE
                id = ?
            ",
            table = scope_table(kind),
        );

        self.tx(async |tx| {
            let result = query(&sql)
                .bind(scope.as_str())
                .fetch_optional(&mut **tx)
                .await?;
            Ok(result.is_some())
        })
        .await
    }

    async fn insert_item(&self, item: &OrderedItem) -> Result<(), Self::Error> {
        let sql = format!(
            "
            INSERT INTO
                {table} (
                    id,
                    {scope},
                    position,
                    title,
                    description
                )
            VALUES
                (?, ?, ?, ?, ?)
            ",
            scope = scope_column(item.kind),
            table = table(item.kind),
        );

        self.tx(async |tx| {
            query(&sql)
                .bind(item.id.as_str())
                .bind(item.scope.as_str())
                .bind(item.position)
                .bind(item.fields.title.as_str())
                .bind(item.fields.description.as_deref())
                .execute(&mut **tx)
                .await?;
            Ok(())
        })
        .await
    }

    async fn update_fields(
        &self,
        kind: ItemKind,
        id: &Id,
        fields: &ItemFields,
    ) -> Result<bool, Self::Error> {
        let sql = format!(
            "
            UPDATE
                {table}
            SET
                title = ?,
                description = ?
            WHERE
                id = ?
            ",
            table = table(kind),
        );

        self.tx(async |tx| {
            let result = query(&sql)
                .bind(fields.title.as_str())
                .bind(fields.description.as_deref())
                .bind(id.as_str())
                .execute(&mut **tx)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn set_position(
        &self,
        kind: ItemKind,
        id: &Id,
        position: Position,
    ) -> Result<bool, Self::Error> {
        let sql = format!(
            "
            UPDATE
                {table}
            SET
                position = ?
            WHERE
                id = ?
            ",
            table = table(kind),
        );

        self.tx(async |tx| {
            let result = query(&sql)
                .bind(position)
                .bind(id.as_str())
                .execute(&mut **tx)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn shift_positions(
        &self,
        kind: ItemKind,
        scope: &Id,
        range: RangeInclusive<Position>,
        delta: i64,
    ) -> Result<u64, Self::Error> {
        let sql = format!(
            "
            UPDATE
                {table}
            SET
                position = position + ?
            WHERE
                {scope} = ?
                AND position BETWEEN ? AND ?
            ",
            scope = scope_column(kind),
            table = table(kind),
        );

        self.tx(async |tx| {
            let result = query(&sql)
                .bind(delta)
                .bind(scope.as_str())
                .bind(*range.start())
                .bind(*range.end())
                .execute(&mut **tx)
                .await?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn remove_item(&self, kind: ItemKind, id: &Id) -> Result<bool, Self::Error> {
        // Items ordered inside the removed one are deleted by the "ON DELETE CASCADE" foreign key
        // constraints.
        let sql = format!(
            "
            DELETE FROM
                {table}
            WHERE
                id = ?
            ",
            table = table(kind),
        );

        self.tx(async |tx| {
            let result = query(&sql).bind(id.as_str()).execute(&mut **tx).await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }
}

/// Single panel, stack or card row as it is inserted in the SQLite database.
#[derive(Debug, FromRow)]
struct ItemRow {
    id: String,
    scope_id: String,
    position: i64,
    title: String,
    description: Option<String>,
}

impl ItemRow {
    fn into_item(self, kind: ItemKind) -> Result<OrderedItem, SqliteError> {
        if self.position < 0 {
            return Err(SqliteError::Decode(
                "position".into(),
                DecodeError::Position(self.position),
            ));
        }

        Ok(OrderedItem {
            id: self.id.parse().map_err(|err: IdentityError| {
                SqliteError::Decode("id".into(), err.into())
            })?,
            kind,
            scope: self.scope_id.parse().map_err(|err: IdentityError| {
                SqliteError::Decode("scope_id".into(), err.into())
            })?,
            position: self.position,
            fields: ItemFields {
                title: self.title,
                description: self.description,
            },
        })
    }
}
