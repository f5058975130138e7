//! Executes authorized key operations.

mod keys;

use std::sync::Arc;

use crypto_box::{
    aead::{generic_array::GenericArray, Aead},
    PublicKey as BoxPublicKey, SalsaBox, SecretKey as BoxSecretKey,
};
use ed25519_dalek::Signer;
use zeroize::Zeroize;

use crate::error::{GrantKitError, GrantKitResult};
use crate::secret::SessionSecret;
use crate::store::TokenStore;
use crate::token::Operation;

pub use keys::{address_from_public_key, KeyPair, WalletKeyProvider};
pub(crate) use keys::ResolvedKey;

/// Fixed nonce of the legacy box format. Only safe because each token is
/// single-purpose and short-lived; do not reuse for general encryption.
const LEGACY_BOX_NONCE: [u8; 24] = [0u8; 24];

/// Input of a key operation.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct OperationParams {
    /// Message; its UTF-8 bytes are signed or encrypted.
    pub data: String,
    /// Recipient X25519 public key (hex), required for `asymmetric-encrypt`.
    pub recipient_public_key: Option<String>,
}

impl OperationParams {
    /// Parameters for a signature over `data`.
    #[must_use]
    pub fn sign(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            recipient_public_key: None,
        }
    }

    /// Parameters for encrypting `data` to `recipient_public_key`.
    #[must_use]
    pub fn encrypt(data: impl Into<String>, recipient_public_key: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            recipient_public_key: Some(recipient_public_key.into()),
        }
    }
}

/// Output of a key operation.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct ExecutionResult {
    /// Signature or ciphertext, hex-encoded.
    pub result: String,
    /// Ed25519 public key of the key used, hex-encoded.
    pub public_key: String,
    /// Address bound to the token.
    pub address: String,
}

/// Performs operations with wallet keys on behalf of validated tokens.
pub struct CryptoExecutor {
    store: Arc<TokenStore>,
    wallet: Arc<dyn WalletKeyProvider>,
}

impl std::fmt::Debug for CryptoExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoExecutor")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl CryptoExecutor {
    /// Creates an executor over `store`, resolving keys through `wallet`.
    #[must_use]
    pub fn new(store: Arc<TokenStore>, wallet: Arc<dyn WalletKeyProvider>) -> Self {
        Self { store, wallet }
    }

    /// Validates the token and performs `operation`.
    ///
    /// Key material is only resolved from the wallet with the identifiers held
    /// in the token's decrypted payload, never with caller-supplied values.
    ///
    /// # Errors
    ///
    /// Any validation rejection unchanged; `AddressMismatch` if
    /// `expected_address` differs from the token's address;
    /// `InvalidSessionSecret` if the resolved key does not match the token's
    /// address; `InvalidInput` for malformed operation parameters.
    pub async fn execute(
        &self,
        token_id: &str,
        session_secret: &SessionSecret,
        operation: Operation,
        params: &OperationParams,
        caller_requester_id: &str,
        expected_address: Option<&str>,
    ) -> GrantKitResult<ExecutionResult> {
        let payload = self
            .store
            .validate_token(token_id, session_secret, caller_requester_id, operation)
            .await?;

        if let Some(expected) = expected_address {
            if expected != payload.address() {
                return Err(GrantKitError::AddressMismatch);
            }
        }

        let mut key_pair = self
            .wallet
            .resolve_key_pair(
                payload.wallet_id().to_string(),
                payload.unlock_secret().to_string(),
            )
            .await?;
        let resolved = ResolvedKey::from_key_pair(&key_pair);
        key_pair.secret_key.zeroize();
        let key = resolved?;

        if key.address() != payload.address() {
            log::error!("token {token_id} is bound to an address its wallet key does not derive");
            return Err(GrantKitError::InvalidSessionSecret);
        }

        let result = match operation {
            Operation::Sign => sign(&key, params),
            Operation::AsymmetricEncrypt => encrypt(&key, params)?,
        };

        log::debug!("executed {operation} with token {token_id}");
        Ok(ExecutionResult {
            result: hex::encode(result),
            public_key: hex::encode(key.verifying_key().as_bytes()),
            address: payload.address().to_string(),
        })
    }
}

fn sign(key: &ResolvedKey, params: &OperationParams) -> Vec<u8> {
    key.signing_key()
        .sign(params.data.as_bytes())
        .to_bytes()
        .to_vec()
}

fn encrypt(key: &ResolvedKey, params: &OperationParams) -> GrantKitResult<Vec<u8>> {
    let recipient = params.recipient_public_key.as_deref().ok_or_else(|| {
        GrantKitError::InvalidInput("recipient_public_key is required".to_string())
    })?;
    let mut recipient_bytes = [0u8; 32];
    hex::decode_to_slice(recipient.trim_start_matches("0x"), &mut recipient_bytes).map_err(
        |err| GrantKitError::InvalidInput(format!("invalid recipient_public_key: {err}")),
    )?;

    let sender_secret = BoxSecretKey::from(key.signing_key().to_scalar_bytes());
    let recipient_key = BoxPublicKey::from(recipient_bytes);
    let salsa_box = SalsaBox::new(&recipient_key, &sender_secret);
    salsa_box
        .encrypt(
            GenericArray::from_slice(&LEGACY_BOX_NONCE),
            params.data.as_bytes(),
        )
        .map_err(|err| GrantKitError::Internal(format!("box encryption failed: {err}")))
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signature, SigningKey, Verifier};

    use super::*;

    fn resolved(seed: [u8; 32]) -> ResolvedKey {
        let signing_key = SigningKey::from_bytes(&seed);
        ResolvedKey::from_key_pair(&KeyPair {
            secret_key: seed.to_vec(),
            public_key: signing_key.verifying_key().to_bytes().to_vec(),
        })
        .expect("resolve")
    }

    #[test]
    fn test_sign_is_deterministic_and_verifies() {
        let key = resolved([7u8; 32]);
        let first = sign(&key, &OperationParams::sign("hello"));
        let second = sign(&key, &OperationParams::sign("hello"));
        assert_eq!(first.len(), 64);
        assert_eq!(first, second);

        let signature = Signature::from_slice(&first).expect("signature");
        key.verifying_key()
            .verify(b"hello", &signature)
            .expect("verify");
    }

    #[test]
    fn test_encrypt_opens_for_recipient() {
        let key = resolved([8u8; 32]);
        let recipient_secret = BoxSecretKey::from([9u8; 32]);
        let recipient_public = hex::encode(recipient_secret.public_key().as_bytes());

        let ciphertext =
            encrypt(&key, &OperationParams::encrypt("secret note", recipient_public)).expect("encrypt");

        let sender_public = BoxPublicKey::from(key.verifying_key().to_montgomery().to_bytes());
        let opened = SalsaBox::new(&sender_public, &recipient_secret)
            .decrypt(GenericArray::from_slice(&LEGACY_BOX_NONCE), ciphertext.as_slice())
            .expect("decrypt");
        assert_eq!(opened, b"secret note");
    }

    #[test]
    fn test_encrypt_requires_recipient() {
        let key = resolved([8u8; 32]);
        assert!(matches!(
            encrypt(&key, &OperationParams::sign("no recipient")),
            Err(GrantKitError::InvalidInput(_))
        ));
        assert!(matches!(
            encrypt(&key, &OperationParams::encrypt("x", "abcd")),
            Err(GrantKitError::InvalidInput(_))
        ));
    }
}
