// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers to test store implementations.
use taskboard_core::{Board, Id, Organization, UserId};

use crate::resources::ResourceStore;
use crate::traits::atomically;

/// Macro to run the same test logic against all store backend implementations.
///
/// This macro takes a closure that will be executed against each store type:
/// - In-memory store (`MemoryStore`)
/// - SQLite store (`SqliteStore`)
///
/// Stores are handed over without an open transaction, the test body either calls the
/// `Positions` operations (which start their own) or uses `atomically`.
///
/// ## Example
///
/// ```rust
/// # use taskboard_core::{ItemFields, ItemKind};
/// # use taskboard_store::{assert_all_stores, Positions};
/// # use taskboard_store::test_utils::insert_board;
/// # async fn run() {
/// assert_all_stores!(|store| async {
///     let board = insert_board(&store).await;
///     let positions = Positions::new(store.clone());
///     let panel = positions
///         .create(ItemKind::Panel, &board.id, ItemFields::new("Todo"))
///         .await
///         .unwrap();
///     assert_eq!(panel.position, 0);
/// });
/// # }
/// ```
#[macro_export]
macro_rules! assert_all_stores {
    (|$store:ident| $test_body:expr) => {
        // Test with MemoryStore.
        {
            let $store = $crate::memory::MemoryStore::default();
            $test_body.await;
        }

        // Test with SqliteStore.
        {
            let sqlite_store = $crate::sqlite::SqliteStoreBuilder::new()
                .random_memory_url()
                // We're running in a single test thread and can't have more parallel connections.
                .max_connections(1)
                .build()
                .await
                .unwrap();
            let $store = sqlite_store.clone();
            $test_body.await;
            sqlite_store.close().await;
        }
    };
}

pub fn owner() -> UserId {
    "auth0|owner".parse().expect("valid user id")
}

pub fn board() -> Board {
    Board {
        id: Id::new(),
        owner_id: owner(),
        name: "Roadmap".into(),
        description: None,
        is_private: true,
    }
}

pub fn organization() -> Organization {
    Organization {
        id: Id::new(),
        owner_id: owner(),
        name: "Acme".into(),
        description: Some("Everything about anvils".into()),
    }
}

/// Persists a fresh private board in its own transaction.
pub async fn insert_board<S: ResourceStore>(store: &S) -> Board {
    let board = board();
    atomically(store, async |store: &S| store.insert_board(&board).await)
        .await
        .expect("insert board");
    board
}
