// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence for organizations, boards and ordered items.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use taskboard_core::{Board, Id, ItemKind, OrderedItem, Organization};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Records held by the in-memory store.
#[derive(Clone, Debug, Default)]
pub struct InnerMemoryStore {
    pub(crate) organizations: HashMap<Id, Organization>,
    pub(crate) boards: HashMap<Id, Board>,
    pub(crate) items: HashMap<ItemKind, HashMap<Id, OrderedItem>>,
}

impl InnerMemoryStore {
    pub(crate) fn items(&self, kind: ItemKind) -> impl Iterator<Item = &OrderedItem> {
        self.items.get(&kind).into_iter().flat_map(|items| items.values())
    }

    pub(crate) fn items_mut(&mut self, kind: ItemKind) -> &mut HashMap<Id, OrderedItem> {
        self.items.entry(kind).or_default()
    }

    /// Removes all items ordered inside the scope, recursively.
    pub(crate) fn remove_children(&mut self, kind: ItemKind, scope: &Id) {
        let Some(child_kind) = kind.children() else {
            return;
        };

        let children: Vec<Id> = self
            .items(child_kind)
            .filter(|item| &item.scope == scope)
            .map(|item| item.id.clone())
            .collect();

        for child in children {
            self.items_mut(child_kind).remove(&child);
            self.remove_children(child_kind, &child);
        }
    }
}

/// In-memory store.
///
/// This does not persist data permamently, all changes are lost when the process ends. Use this
/// only in development or test contexts.
///
/// Transactions behave like the ones of `SqliteStore`: they are strictly serialized through a
/// permit and every query needs to happen inside of one. Beginning a transaction takes a snapshot
/// of all records which is restored on rollback.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    inner: Arc<RwLock<InnerMemoryStore>>,
    snapshot: Arc<Mutex<Option<InnerMemoryStore>>>,
    semaphore: Arc<Semaphore>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::default(),
            snapshot: Arc::default(),
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Obtain a read-lock on the store.
    fn read_store(&self) -> RwLockReadGuard<'_, InnerMemoryStore> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    /// Obtain a write-lock on the store.
    fn write_store(&self) -> RwLockWriteGuard<'_, InnerMemoryStore> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }

    fn in_transaction(&self) -> bool {
        self.snapshot
            .lock()
            .expect("acquire access on snapshot")
            .is_some()
    }

    /// Read records within the current transaction.
    pub(crate) fn read<F, R>(&self, f: F) -> Result<R, MemoryError>
    where
        F: FnOnce(&InnerMemoryStore) -> R,
    {
        if !self.in_transaction() {
            return Err(MemoryError::TransactionMissing);
        }
        Ok(f(&self.read_store()))
    }

    /// Change records within the current transaction.
    pub(crate) fn write<F, R>(&self, f: F) -> Result<R, MemoryError>
    where
        F: FnOnce(&mut InnerMemoryStore) -> R,
    {
        if !self.in_transaction() {
            return Err(MemoryError::TransactionMissing);
        }
        Ok(f(&mut self.write_store()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::traits::Transaction for MemoryStore {
    type Error = MemoryError;

    type Permit = MemoryPermit;

    async fn begin(&self) -> Result<MemoryPermit, MemoryError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("if semaphore is closed then the whole struct is gone as well");

        let snapshot = self.read_store().clone();
        let mut snapshot_ref = self.snapshot.lock().expect("acquire access on snapshot");
        assert!(
            snapshot_ref.is_none(),
            "can't have an already existing transaction after an just-acquired permit"
        );
        snapshot_ref.replace(snapshot);

        Ok(MemoryPermit(permit))
    }

    async fn rollback(&self, permit: MemoryPermit) -> Result<(), MemoryError> {
        let Some(snapshot) = self
            .snapshot
            .lock()
            .expect("acquire access on snapshot")
            .take()
        else {
            panic!("can't have no transaction without dropping permit first")
        };

        *self.write_store() = snapshot;
        drop(permit);

        Ok(())
    }

    async fn commit(&self, permit: MemoryPermit) -> Result<(), MemoryError> {
        let Some(_) = self
            .snapshot
            .lock()
            .expect("acquire access on snapshot")
            .take()
        else {
            panic!("can't have no transaction without dropping permit first")
        };

        drop(permit);

        Ok(())
    }
}

#[allow(unused)]
pub struct MemoryPermit(OwnedSemaphorePermit);

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("tried to interact with inexistant transaction")]
    TransactionMissing,
}

#[cfg(test)]
mod tests {
    use taskboard_core::{Board, Id};

    use crate::memory::{MemoryError, MemoryStore};
    use crate::traits::Transaction;

    fn board() -> Board {
        Board {
            id: Id::new(),
            owner_id: "auth0|owner".parse().unwrap(),
            name: "Roadmap".into(),
            description: None,
            is_private: true,
        }
    }

    #[tokio::test]
    async fn queries_need_transaction() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.read(|_| ()),
            Err(MemoryError::TransactionMissing)
        ));

        let permit = store.begin().await.unwrap();
        assert!(store.read(|_| ()).is_ok());
        store.commit(permit).await.unwrap();
    }

    #[tokio::test]
    async fn rollback_restores_snapshot() {
        let store = MemoryStore::new();
        let board = board();

        let permit = store.begin().await.unwrap();
        store
            .write(|inner| inner.boards.insert(board.id.clone(), board.clone()))
            .unwrap();
        store.rollback(permit).await.unwrap();

        let permit = store.begin().await.unwrap();
        assert!(store.read(|inner| inner.boards.is_empty()).unwrap());
        store
            .write(|inner| inner.boards.insert(board.id.clone(), board.clone()))
            .unwrap();
        store.commit(permit).await.unwrap();

        let permit = store.begin().await.unwrap();
        assert_eq!(store.read(|inner| inner.boards.len()).unwrap(), 1);
        store.commit(permit).await.unwrap();
    }
}
