//! Token types shared by the store, the executor and the FFI surface.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{GrantKitError, GrantKitResult};

/// A key operation a mini-application can be granted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    Display,
    Serialize,
    Deserialize,
    uniffi::Enum,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Ed25519 signature over a message.
    Sign,
    /// NaCl box encryption of a message to a recipient public key.
    AsymmetricEncrypt,
}

impl Operation {
    /// Parses a wire operation name such as `sign` or `asymmetric-encrypt`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for unknown names.
    pub fn parse(name: &str) -> GrantKitResult<Self> {
        Self::from_str(name)
            .map_err(|_| GrantKitError::InvalidInput(format!("unknown operation `{name}`")))
    }
}

/// Lifetime options a user can pick when authorizing a mini-application.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, uniffi::Enum,
)]
pub enum TokenDuration {
    /// Five minutes.
    #[strum(serialize = "5min")]
    FiveMinutes,
    /// Thirty minutes.
    #[strum(serialize = "30min")]
    ThirtyMinutes,
    /// Two hours.
    #[strum(serialize = "2hour")]
    TwoHours,
    /// One day.
    #[strum(serialize = "1day")]
    OneDay,
}

impl TokenDuration {
    /// Returns the lifetime in seconds.
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        match self {
            Self::FiveMinutes => 5 * 60,
            Self::ThirtyMinutes => 30 * 60,
            Self::TwoHours => 2 * 60 * 60,
            Self::OneDay => 24 * 60 * 60,
        }
    }

    /// Parses a wire duration name such as `30min`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for unknown names.
    pub fn parse(name: &str) -> GrantKitResult<Self> {
        Self::from_str(name)
            .map_err(|_| GrantKitError::InvalidInput(format!("unknown duration `{name}`")))
    }
}

/// Caller-visible view of a capability token.
///
/// This is convenience data for listing; it is never used to authorize anything.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct Token {
    /// Opaque unique identifier (UUID v4).
    pub token_id: String,
    /// Mini-application the token was issued to.
    pub requester_id: String,
    /// Wallet holding the key material.
    pub wallet_id: String,
    /// Address the token is bound to.
    pub address: String,
    /// Permitted operations, sorted and deduplicated.
    pub operations: Vec<Operation>,
    /// Creation time in unix seconds.
    pub created_at: u64,
    /// Expiry time in unix seconds.
    pub expires_at: u64,
}

impl Token {
    /// Whether the token is expired at `now`.
    #[must_use]
    pub const fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}

/// Persisted token record: the plaintext view plus the sealed payload.
///
/// Only `encrypted_payload` is authoritative; the other fields may be stale or
/// tampered with and are only used for listing and expiry indexing.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct StoredToken {
    /// Primary key.
    pub token_id: String,
    /// Secondary index: requester.
    pub requester_id: String,
    /// Wallet holding the key material.
    pub wallet_id: String,
    /// Address the token is bound to.
    pub address: String,
    /// Wire names of the permitted operations.
    pub operations: Vec<String>,
    /// Creation time in unix seconds.
    pub created_at: u64,
    /// Secondary index: expiry time in unix seconds.
    pub expires_at: u64,
    /// Opaque sealed payload.
    pub encrypted_payload: Vec<u8>,
}

impl StoredToken {
    pub(crate) fn new(token: &Token, encrypted_payload: Vec<u8>) -> Self {
        Self {
            token_id: token.token_id.clone(),
            requester_id: token.requester_id.clone(),
            wallet_id: token.wallet_id.clone(),
            address: token.address.clone(),
            operations: token.operations.iter().map(ToString::to_string).collect(),
            created_at: token.created_at,
            expires_at: token.expires_at,
            encrypted_payload,
        }
    }

    /// Returns the plaintext view without the encrypted payload.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if a stored operation name is unknown.
    pub fn view(&self) -> GrantKitResult<Token> {
        let operations = self
            .operations
            .iter()
            .map(|name| {
                Operation::from_str(name).map_err(|_| {
                    GrantKitError::Serialization(format!(
                        "unknown stored operation `{name}`"
                    ))
                })
            })
            .collect::<GrantKitResult<Vec<_>>>()?;
        Ok(Token {
            token_id: self.token_id.clone(),
            requester_id: self.requester_id.clone(),
            wallet_id: self.wallet_id.clone(),
            address: self.address.clone(),
            operations,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

/// Sorts and deduplicates a requested operation set, rejecting an empty one.
pub(crate) fn normalize_operations(operations: &[Operation]) -> GrantKitResult<Vec<Operation>> {
    let mut operations = operations.to_vec();
    operations.sort_unstable();
    operations.dedup();
    if operations.is_empty() {
        return Err(GrantKitError::InvalidInput(
            "at least one operation must be requested".to_string(),
        ));
    }
    Ok(operations)
}
