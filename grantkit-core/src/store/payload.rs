//! Sealed token payload.
//!
//! The payload is the only authoritative record of a token's security-relevant
//! fields. It is CBOR-encoded, then sealed under the token's session secret with
//! the token id as associated data.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::PayloadCipher;
use crate::error::{GrantKitError, GrantKitResult};
use crate::secret::SessionSecret;
use crate::token::Operation;

use super::PAYLOAD_AD_PREFIX;

const PAYLOAD_VERSION: u32 = 1;

/// Decrypted payload of a token that passed validation.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct TokenPayload {
    version: u32,
    unlock_secret: String,
    requester_id: String,
    wallet_id: String,
    address: String,
    #[zeroize(skip)]
    operations: Vec<Operation>,
    expires_at: u64,
}

impl std::fmt::Debug for TokenPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPayload")
            .field("requester_id", &self.requester_id)
            .field("wallet_id", &self.wallet_id)
            .field("address", &self.address)
            .field("operations", &self.operations)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl TokenPayload {
    pub(crate) fn new(
        unlock_secret: &str,
        requester_id: &str,
        wallet_id: &str,
        address: &str,
        operations: Vec<Operation>,
        expires_at: u64,
    ) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            unlock_secret: unlock_secret.to_string(),
            requester_id: requester_id.to_string(),
            wallet_id: wallet_id.to_string(),
            address: address.to_string(),
            operations,
            expires_at,
        }
    }

    /// Unlock secret for the wallet's key material. Treat as sensitive.
    #[must_use]
    pub fn unlock_secret(&self) -> &str {
        &self.unlock_secret
    }

    /// Mini-application the token was issued to.
    #[must_use]
    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }

    /// Wallet holding the key material.
    #[must_use]
    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    /// Address the token is bound to.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Permitted operations.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Expiry time in unix seconds.
    #[must_use]
    pub const fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Whether `operation` is granted by this payload.
    #[must_use]
    pub fn permits(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }

    /// Encodes and seals the payload for `token_id`.
    pub(crate) fn seal(
        &self,
        cipher: &dyn PayloadCipher,
        secret: &SessionSecret,
        token_id: &str,
    ) -> GrantKitResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|err| GrantKitError::Serialization(err.to_string()))?;
        let sealed = cipher.seal(secret.as_bytes(), &associated_data(token_id), &bytes);
        bytes.zeroize();
        sealed
    }

    /// Opens and decodes a sealed payload.
    ///
    /// Any failure of the cipher is reported as `InvalidSessionSecret`, without
    /// the cipher's own diagnostics.
    pub(crate) fn open(
        cipher: &dyn PayloadCipher,
        secret: &SessionSecret,
        token_id: &str,
        sealed: &[u8],
    ) -> GrantKitResult<Self> {
        let mut bytes = cipher
            .open(secret.as_bytes(), &associated_data(token_id), sealed)
            .map_err(|_| GrantKitError::InvalidSessionSecret)?;
        let decoded: GrantKitResult<Self> = ciborium::de::from_reader(bytes.as_slice())
            .map_err(|err| GrantKitError::Serialization(err.to_string()));
        bytes.zeroize();
        let payload = decoded?;
        if payload.version != PAYLOAD_VERSION {
            return Err(GrantKitError::Serialization(format!(
                "unsupported payload version {}",
                payload.version
            )));
        }
        Ok(payload)
    }
}

fn associated_data(token_id: &str) -> Vec<u8> {
    let mut ad = Vec::with_capacity(PAYLOAD_AD_PREFIX.len() + token_id.len());
    ad.extend_from_slice(PAYLOAD_AD_PREFIX);
    ad.extend_from_slice(token_id.as_bytes());
    ad
}
