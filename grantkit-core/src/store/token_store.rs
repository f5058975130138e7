//! Token store: creation, lookup, validation and expiry of capability tokens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::cipher::PayloadCipher;
use crate::clock::Clock;
use crate::error::{GrantKitError, GrantKitResult};
use crate::secret::{derive_session_secret, SessionSecret};
use crate::token::{normalize_operations, Operation, StoredToken, Token, TokenDuration};

use super::payload::TokenPayload;
use super::traits::TokenRecordStore;

/// Registry of capability tokens backed by a [`TokenRecordStore`].
///
/// The store must be [initialized](Self::initialize) before use; every other
/// call fails with `NotInitialized` until then, and again after
/// [`close`](Self::close).
pub struct TokenStore {
    records: Arc<dyn TokenRecordStore>,
    cipher: Arc<dyn PayloadCipher>,
    clock: Arc<dyn Clock>,
    ready: AtomicBool,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("ready", &self.ready.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Creates an uninitialized store from its collaborators.
    #[must_use]
    pub fn new(
        records: Arc<dyn TokenRecordStore>,
        cipher: Arc<dyn PayloadCipher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            cipher,
            clock,
            ready: AtomicBool::new(false),
        }
    }

    /// Marks the store ready, optionally sweeping expired records.
    ///
    /// Calling this on a ready store does nothing and returns `0`.
    ///
    /// # Returns
    ///
    /// The number of expired records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the sweep fails; the store is left not ready.
    pub async fn initialize(&self, sweep: bool) -> GrantKitResult<u64> {
        if self.is_ready() {
            return Ok(0);
        }
        // Not ready until the sweep has finished.
        let removed = if sweep { self.remove_expired().await? } else { 0 };
        self.ready.store(true, Ordering::Release);
        Ok(removed)
    }

    /// Marks the store closed. Subsequent calls fail until re-initialized.
    pub fn close(&self) {
        self.ready.store(false, Ordering::Release);
    }

    /// Whether [`initialize`](Self::initialize) has run and the store is not closed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_ready(&self) -> GrantKitResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(GrantKitError::NotInitialized)
        }
    }

    /// Issues a new token and returns its view and session secret.
    ///
    /// The session secret is not persisted anywhere; losing it makes the token
    /// unusable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for empty identifiers or an empty operation set,
    /// or an error if sealing or persisting the record fails.
    pub async fn create_token(
        &self,
        requester_id: &str,
        wallet_id: &str,
        address: &str,
        operations: &[Operation],
        duration: TokenDuration,
        unlock_secret: &SecretString,
    ) -> GrantKitResult<(Token, SessionSecret)> {
        self.ensure_ready()?;
        if address.is_empty() {
            return Err(GrantKitError::InvalidInput(
                "address must not be empty".to_string(),
            ));
        }
        let operations = normalize_operations(operations)?;

        let token_id = Uuid::new_v4().to_string();
        let created_at = self.clock.now()?;
        let expires_at = created_at
            .checked_add(duration.as_secs())
            .ok_or_else(|| GrantKitError::Internal("expiry overflow".to_string()))?;

        let unlock_secret = unlock_secret.expose_secret();
        let session_secret =
            derive_session_secret(wallet_id, unlock_secret, requester_id, &token_id)?;

        let payload = TokenPayload::new(
            unlock_secret,
            requester_id,
            wallet_id,
            address,
            operations.clone(),
            expires_at,
        );
        let encrypted_payload =
            payload.seal(self.cipher.as_ref(), &session_secret, &token_id)?;

        let token = Token {
            token_id,
            requester_id: requester_id.to_string(),
            wallet_id: wallet_id.to_string(),
            address: address.to_string(),
            operations,
            created_at,
            expires_at,
        };
        self.records
            .put(StoredToken::new(&token, encrypted_payload))
            .await?;

        log::info!(
            "issued token {} to {} for {:?} until {}",
            token.token_id,
            token.requester_id,
            token.operations,
            token.expires_at
        );
        Ok((token, session_secret))
    }

    /// Looks up a stored record by token id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not ready or the read fails.
    pub async fn get_token(&self, token_id: &str) -> GrantKitResult<Option<StoredToken>> {
        self.ensure_ready()?;
        self.records.get(token_id.to_string()).await
    }

    /// Deletes a token. Deleting an unknown token is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not ready or the delete fails.
    pub async fn delete_token(&self, token_id: &str) -> GrantKitResult<()> {
        self.ensure_ready()?;
        self.records.delete(token_id.to_string()).await?;
        log::debug!("deleted token {token_id}");
        Ok(())
    }

    /// Proves possession of a token without checking a specific operation.
    ///
    /// Runs the lookup, session-secret, requester and expiry checks of
    /// [`validate_token`](Self::validate_token). An expired record is deleted
    /// before `TokenExpired` is returned.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as a typed rejection.
    pub async fn authenticate_token(
        &self,
        token_id: &str,
        session_secret: &SessionSecret,
        caller_requester_id: &str,
    ) -> GrantKitResult<TokenPayload> {
        self.ensure_ready()?;

        let Some(record) = self.records.get(token_id.to_string()).await? else {
            return Err(GrantKitError::TokenNotFound);
        };

        let payload = TokenPayload::open(
            self.cipher.as_ref(),
            session_secret,
            token_id,
            &record.encrypted_payload,
        )?;

        let same_requester: bool = payload
            .requester_id()
            .as_bytes()
            .ct_eq(caller_requester_id.as_bytes())
            .into();
        if !same_requester {
            log::warn!("token {token_id} presented by foreign requester {caller_requester_id}");
            return Err(GrantKitError::MiniappMismatch);
        }

        if payload.expires_at() <= self.clock.now()? {
            self.records.delete(token_id.to_string()).await?;
            log::debug!("removed expired token {token_id}");
            return Err(GrantKitError::TokenExpired);
        }

        Ok(payload)
    }

    /// Decides whether the caller may perform `operation` with a token.
    ///
    /// Checks run in order and stop at the first failure: the token exists, the
    /// session secret opens its payload, the payload names the caller, the token
    /// has not expired, and the payload grants `operation`. Only the decrypted
    /// payload is consulted, never the plaintext fields of the stored record.
    ///
    /// # Errors
    ///
    /// `TokenNotFound`, `InvalidSessionSecret`, `MiniappMismatch`,
    /// `TokenExpired` or `ActionNotPermitted`.
    pub async fn validate_token(
        &self,
        token_id: &str,
        session_secret: &SessionSecret,
        caller_requester_id: &str,
        operation: Operation,
    ) -> GrantKitResult<TokenPayload> {
        let payload = self
            .authenticate_token(token_id, session_secret, caller_requester_id)
            .await?;
        if !payload.permits(operation) {
            return Err(GrantKitError::ActionNotPermitted);
        }
        Ok(payload)
    }

    /// Deletes every record whose expiry has passed.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not ready or a storage call fails.
    pub async fn sweep_expired(&self) -> GrantKitResult<u64> {
        self.ensure_ready()?;
        self.remove_expired().await
    }

    async fn remove_expired(&self) -> GrantKitResult<u64> {
        let now = self.clock.now()?;
        let expired = self.records.list_expired(now).await?;
        let mut removed = 0u64;
        for token_id in expired {
            self.records.delete(token_id).await?;
            removed += 1;
        }
        if removed > 0 {
            log::info!("swept {removed} expired tokens");
        }
        Ok(removed)
    }

    /// Lists the non-expired tokens issued to `requester_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not ready, the query fails, or a record
    /// cannot be decoded.
    pub async fn list_by_requester(&self, requester_id: &str) -> GrantKitResult<Vec<Token>> {
        self.ensure_ready()?;
        let now = self.clock.now()?;
        let mut tokens = self
            .records
            .list_by_requester(requester_id.to_string())
            .await?
            .iter()
            .map(StoredToken::view)
            .filter(|token| token.as_ref().map_or(true, |token| !token.is_expired(now)))
            .collect::<GrantKitResult<Vec<_>>>()?;
        tokens.sort_by_key(|token| token.created_at);
        Ok(tokens)
    }
}
