//! Wallet key resolution and address derivation.

use ed25519_dalek::{SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{GrantKitError, GrantKitResult};

/// Raw key pair returned by the wallet.
///
/// `secret_key` is either the 32-byte Ed25519 seed or the 64-byte
/// `seed || public_key` form. Holders should zeroize it once resolved.
#[derive(Clone, uniffi::Record)]
pub struct KeyPair {
    /// Ed25519 secret key bytes.
    pub secret_key: Vec<u8>,
    /// Ed25519 public key bytes.
    pub public_key: Vec<u8>,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(&self.public_key))
            .finish_non_exhaustive()
    }
}

/// Wallet storage collaborator that owns mnemonic storage and key derivation.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait WalletKeyProvider: Send + Sync {
    /// Decrypts the wallet's key material with the user's unlock secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the wallet is unknown or the unlock secret is wrong.
    async fn resolve_key_pair(
        &self,
        wallet_id: String,
        unlock_secret: String,
    ) -> GrantKitResult<KeyPair>;
}

/// Derives the wallet address for an Ed25519 public key (base58 of the key bytes).
#[must_use]
pub fn address_from_public_key(public_key: &VerifyingKey) -> String {
    bs58::encode(public_key.as_bytes()).into_string()
}

/// Signing key checked against the public key the wallet returned.
///
/// `SigningKey` zeroizes itself on drop.
pub(crate) struct ResolvedKey {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl ResolvedKey {
    /// Builds the signing key and verifies the pair is internally consistent.
    ///
    /// An inconsistent pair means the stored material does not belong to the
    /// token; it is reported as `InvalidSessionSecret`.
    pub(crate) fn from_key_pair(key_pair: &KeyPair) -> GrantKitResult<Self> {
        let mut seed = [0u8; SECRET_KEY_LENGTH];
        match key_pair.secret_key.len() {
            SECRET_KEY_LENGTH => seed.copy_from_slice(&key_pair.secret_key),
            len if len == SECRET_KEY_LENGTH + PUBLIC_KEY_LENGTH => {
                let (head, tail) = key_pair.secret_key.split_at(SECRET_KEY_LENGTH);
                let embedded_matches: bool = tail.ct_eq(&key_pair.public_key).into();
                if !embedded_matches {
                    return Err(GrantKitError::InvalidSessionSecret);
                }
                seed.copy_from_slice(head);
            }
            len => {
                return Err(GrantKitError::Internal(format!(
                    "wallet returned a {len}-byte secret key"
                )));
            }
        }

        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        let verifying_key = signing_key.verifying_key();

        let public_matches: bool = verifying_key
            .as_bytes()
            .as_slice()
            .ct_eq(&key_pair.public_key)
            .into();
        if !public_matches {
            log::error!("wallet key pair is inconsistent with its public key");
            return Err(GrantKitError::InvalidSessionSecret);
        }

        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    pub(crate) const fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub(crate) const fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    pub(crate) fn address(&self) -> String {
        address_from_public_key(&self.verifying_key)
    }
}
