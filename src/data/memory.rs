use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;

use super::{IdentityKey, InsertTx, TransactionStore};
use crate::error::StoreError;

/// In-process store, keyed by identity id in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<IndexMap<String, InsertTx>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or_default()
    }

    pub fn all(&self) -> Vec<InsertTx> {
        self.rows
            .lock()
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn exists(&self, key: &IdentityKey) -> Result<bool, StoreError> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_owned()))?;

        Ok(rows.get(&key.id).is_some_and(|tx| tx.key() == *key))
    }

    async fn insert(&self, tx: &InsertTx) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_owned()))?;

        if rows.contains_key(&tx.id) {
            return Err(StoreError::Rejected(format!("duplicate id {}", tx.id)));
        }

        rows.insert(tx.id.to_owned(), tx.clone());

        Ok(())
    }
}
