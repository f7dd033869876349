// SPDX-License-Identifier: MIT OR Apache-2.0

use taskboard_core::{Board, Id, ItemFields, ItemKind, ResourceFields};

use crate::assert_all_stores;
use crate::positions::{PositionError, Positions};
use crate::resources::ResourceStore;
use crate::test_utils::{board, insert_board, organization};
use crate::traits::{Transaction, atomically};

#[tokio::test]
async fn organization_lifecycle() {
    assert_all_stores!(|store| async {
        let organization = organization();

        let permit = store.begin().await.unwrap();
        store.insert_organization(&organization).await.unwrap();
        assert_eq!(
            store.get_organization(&organization.id).await.unwrap(),
            Some(organization.clone())
        );

        let fields = ResourceFields::new("Acme Inc.");
        assert!(
            store
                .update_organization(&organization.id, &fields)
                .await
                .unwrap()
        );
        let updated = store
            .get_organization(&organization.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Acme Inc.");
        assert_eq!(updated.description, None);
        assert_eq!(updated.owner_id, organization.owner_id);

        assert!(store.delete_organization(&organization.id).await.unwrap());
        assert!(!store.delete_organization(&organization.id).await.unwrap());
        assert!(
            !store
                .update_organization(&organization.id, &fields)
                .await
                .unwrap()
        );
        assert_eq!(store.get_organization(&organization.id).await.unwrap(), None);
        store.commit(permit).await.unwrap();
    });
}

#[tokio::test]
async fn board_lifecycle() {
    assert_all_stores!(|store| async {
        let board = board();

        let permit = store.begin().await.unwrap();
        store.insert_board(&board).await.unwrap();
        assert_eq!(store.get_board(&board.id).await.unwrap(), Some(board.clone()));

        let fields = ResourceFields::new("Roadmap 2026").with_description("Next year");
        assert!(store.update_board(&board.id, &fields, false).await.unwrap());
        let updated = store.get_board(&board.id).await.unwrap().unwrap();
        assert_eq!(updated.name, "Roadmap 2026");
        assert_eq!(updated.description.as_deref(), Some("Next year"));
        assert!(!updated.is_private);

        assert!(!store.update_board(&Id::new(), &fields, true).await.unwrap());
        store.commit(permit).await.unwrap();
    });
}

/// Any error returned inside the transaction rolls back the insert.
async fn insert_then_fail<S: ResourceStore>(
    store: &S,
    board: &Board,
) -> Result<(), PositionError<S::Error>> {
    atomically(store, async |store: &S| {
        store.insert_board(board).await?;
        Err(PositionError::NotFound(ItemKind::Panel, Id::new()))
    })
    .await
}

#[tokio::test]
async fn rolled_back_insert_is_gone() {
    assert_all_stores!(|store| async {
        let board = board();

        let result = insert_then_fail(&store, &board).await;
        assert!(matches!(result, Err(PositionError::NotFound(_, _))));

        let permit = store.begin().await.unwrap();
        assert_eq!(store.get_board(&board.id).await.unwrap(), None);
        store.commit(permit).await.unwrap();
    });
}

#[tokio::test]
async fn delete_board_removes_items() {
    assert_all_stores!(|store| async {
        let board = insert_board(&store).await;
        let other = insert_board(&store).await;
        let positions = Positions::new(store.clone());

        let panel = positions
            .create(ItemKind::Panel, &board.id, ItemFields::new("Todo"))
            .await
            .unwrap();
        let stack = positions
            .create(ItemKind::Stack, &panel.id, ItemFields::new("Backlog"))
            .await
            .unwrap();
        let card = positions
            .create(ItemKind::Card, &stack.id, ItemFields::new("Write docs"))
            .await
            .unwrap();
        let kept = positions
            .create(ItemKind::Panel, &other.id, ItemFields::new("Todo"))
            .await
            .unwrap();

        let permit = store.begin().await.unwrap();
        assert!(store.delete_board(&board.id).await.unwrap());
        store.commit(permit).await.unwrap();

        for (kind, id) in [
            (ItemKind::Panel, &panel.id),
            (ItemKind::Stack, &stack.id),
            (ItemKind::Card, &card.id),
        ] {
            assert!(matches!(
                positions.get(kind, id).await,
                Err(PositionError::NotFound(_, _))
            ));
        }
        assert_eq!(positions.get(ItemKind::Panel, &kept.id).await.unwrap(), kept);
    });
}
