//! In-memory token record store.
//!
//! Keeps records in a `HashMap` with the same secondary indexes a persistent
//! backend maintains (by requester, by expiry). Nothing survives a restart, so
//! this suits tests and hosts that want session-scoped tokens only.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::error::{GrantKitError, GrantKitResult};
use crate::token::StoredToken;

use super::traits::TokenRecordStore;

#[derive(Default)]
struct Tables {
    records: HashMap<String, StoredToken>,
    by_requester: HashMap<String, BTreeSet<String>>,
    by_expiry: BTreeSet<(u64, String)>,
}

impl Tables {
    fn insert(&mut self, record: StoredToken) {
        self.remove(&record.token_id);
        self.by_requester
            .entry(record.requester_id.clone())
            .or_default()
            .insert(record.token_id.clone());
        self.by_expiry
            .insert((record.expires_at, record.token_id.clone()));
        self.records.insert(record.token_id.clone(), record);
    }

    fn remove(&mut self, token_id: &str) {
        let Some(record) = self.records.remove(token_id) else {
            return;
        };
        if let Some(ids) = self.by_requester.get_mut(&record.requester_id) {
            ids.remove(token_id);
            if ids.is_empty() {
                self.by_requester.remove(&record.requester_id);
            }
        }
        self.by_expiry
            .remove(&(record.expires_at, record.token_id));
    }
}

/// Token record store held entirely in memory.
#[derive(Default)]
pub struct InMemoryTokenRecordStore {
    tables: Mutex<Tables>,
}

impl std::fmt::Debug for InMemoryTokenRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTokenRecordStore").finish_non_exhaustive()
    }
}

impl InMemoryTokenRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store mutex is poisoned.
    pub fn len(&self) -> GrantKitResult<usize> {
        Ok(self.tables()?.records.len())
    }

    /// Whether the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store mutex is poisoned.
    pub fn is_empty(&self) -> GrantKitResult<bool> {
        Ok(self.len()? == 0)
    }

    fn tables(&self) -> GrantKitResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| GrantKitError::Storage("mutex poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl TokenRecordStore for InMemoryTokenRecordStore {
    async fn put(&self, record: StoredToken) -> GrantKitResult<()> {
        self.tables()?.insert(record);
        Ok(())
    }

    async fn get(&self, token_id: String) -> GrantKitResult<Option<StoredToken>> {
        Ok(self.tables()?.records.get(&token_id).cloned())
    }

    async fn delete(&self, token_id: String) -> GrantKitResult<()> {
        self.tables()?.remove(&token_id);
        Ok(())
    }

    async fn list_by_requester(&self, requester_id: String) -> GrantKitResult<Vec<StoredToken>> {
        let tables = self.tables()?;
        let records = tables
            .by_requester
            .get(&requester_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| tables.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn list_expired(&self, now: u64) -> GrantKitResult<Vec<String>> {
        let tables = self.tables()?;
        Ok(tables
            .by_expiry
            .iter()
            .take_while(|(expires_at, _)| *expires_at <= now)
            .map(|(_, token_id)| token_id.clone())
            .collect())
    }
}
