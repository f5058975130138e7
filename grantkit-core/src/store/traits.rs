//! Platform interfaces for token persistence.

use crate::error::GrantKitResult;
use crate::token::StoredToken;

/// Persistent key-value store for token records.
///
/// Records are keyed by token id, with secondary lookups by requester id and by
/// expiry time. Implementations only store and return records; they never
/// interpret the encrypted payload.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait TokenRecordStore: Send + Sync {
    /// Inserts or replaces the record keyed by `record.token_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn put(&self, record: StoredToken) -> GrantKitResult<()>;

    /// Fetches the record for `token_id`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn get(&self, token_id: String) -> GrantKitResult<Option<StoredToken>>;

    /// Deletes the record for `token_id`. Deleting an absent record succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    async fn delete(&self, token_id: String) -> GrantKitResult<()>;

    /// Returns every record issued to `requester_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn list_by_requester(&self, requester_id: String) -> GrantKitResult<Vec<StoredToken>>;

    /// Returns the ids of every record with `expires_at <= now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn list_expired(&self, now: u64) -> GrantKitResult<Vec<String>>;
}
