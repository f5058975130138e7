//! Authenticated encryption of token payloads.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::{GrantKitError, GrantKitResult};

const NONCE_LEN: usize = 24;

/// Symmetric authenticated-encryption primitive used to seal token payloads.
///
/// Implementations must fail `open` whenever the key, the associated data or
/// the ciphertext differ from what was sealed. They must never return
/// corrupted plaintext.
pub trait PayloadCipher: Send + Sync {
    /// Seals `plaintext` under `key`, authenticating `associated_data`.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    fn seal(
        &self,
        key: &[u8; 32],
        associated_data: &[u8],
        plaintext: &[u8],
    ) -> GrantKitResult<Vec<u8>>;

    /// Opens `ciphertext` under `key`, verifying `associated_data`.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    fn open(
        &self,
        key: &[u8; 32],
        associated_data: &[u8],
        ciphertext: &[u8],
    ) -> GrantKitResult<Vec<u8>>;
}

/// `XChaCha20-Poly1305` with a random nonce prepended to the ciphertext.
#[derive(Debug, Default, Clone, Copy)]
pub struct XChaCha20PayloadCipher;

impl PayloadCipher for XChaCha20PayloadCipher {
    fn seal(
        &self,
        key: &[u8; 32],
        associated_data: &[u8],
        plaintext: &[u8],
    ) -> GrantKitResult<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|err| GrantKitError::Internal(format!("payload seal failed: {err}")))?;
        let mut out = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open(
        &self,
        key: &[u8; 32],
        associated_data: &[u8],
        ciphertext: &[u8],
    ) -> GrantKitResult<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN {
            return Err(GrantKitError::InvalidSessionSecret);
        }
        let (nonce_bytes, payload) = ciphertext.split_at(NONCE_LEN);
        let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
        cipher
            .decrypt(
                XNonce::from_slice(nonce_bytes),
                Payload {
                    msg: payload,
                    aad: associated_data,
                },
            )
            .map_err(|_| GrantKitError::InvalidSessionSecret)
    }
}
