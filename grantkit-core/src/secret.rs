//! Session secret derivation.
//!
//! A session secret is handed to the mini-application once, when its token is
//! created. It is never persisted: it doubles as the key sealing the token
//! payload, so presenting it is what proves possession of the token.

use std::fmt;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{GrantKitError, GrantKitResult};

const SESSION_SECRET_DOMAIN: &[u8] = b"grantkit:session-secret:v1";

/// Length of a session secret in bytes.
pub const SESSION_SECRET_LEN: usize = 32;

/// 256-bit secret bound to a single token.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionSecret([u8; SESSION_SECRET_LEN]);

impl PartialEq for SessionSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SessionSecret {}

impl SessionSecret {
    /// Wraps raw secret bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; SESSION_SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses the hex form returned to callers.
    ///
    /// Anything that is not 64 hex characters cannot be the secret of any
    /// token, so it is rejected as an invalid session secret.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSessionSecret` if the input is malformed.
    pub fn from_hex(value: &str) -> GrantKitResult<Self> {
        let mut bytes = [0u8; SESSION_SECRET_LEN];
        hex::decode_to_slice(value, &mut bytes)
            .map_err(|_| GrantKitError::InvalidSessionSecret)?;
        Ok(Self(bytes))
    }

    /// Hex encoding handed to the mini-application. Treat as sensitive.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw key bytes. Treat as sensitive.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SESSION_SECRET_LEN] {
        &self.0
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(<redacted>)")
    }
}

/// Derives the session secret for a token.
///
/// Each input is length-prefixed so that no two distinct input tuples hash the
/// same byte string. The token id is part of the input, so a secret can never
/// be replayed against another token.
///
/// # Errors
///
/// Returns `InvalidInput` if any input is empty.
pub fn derive_session_secret(
    wallet_id: &str,
    unlock_secret: &str,
    requester_id: &str,
    token_id: &str,
) -> GrantKitResult<SessionSecret> {
    let inputs = [
        ("wallet_id", wallet_id),
        ("unlock_secret", unlock_secret),
        ("requester_id", requester_id),
        ("token_id", token_id),
    ];

    let mut hasher = Sha256::new();
    hasher.update(SESSION_SECRET_DOMAIN);
    for (label, value) in inputs {
        if value.is_empty() {
            return Err(GrantKitError::InvalidInput(format!("{label} must not be empty")));
        }
        let len = u32::try_from(value.len()).map_err(|_| {
            GrantKitError::InvalidInput(format!("{label} is too long"))
        })?;
        hasher.update(len.to_be_bytes());
        hasher.update(value.as_bytes());
    }

    Ok(SessionSecret(hasher.finalize().into()))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let first = derive_session_secret("w", "1234", "app", "t").expect("derive");
        let second = derive_session_secret("w", "1234", "app", "t").expect("derive");
        assert_eq!(first, second);
    }

    #[test]
    fn test_token_id_changes_secret() {
        let first = derive_session_secret("w", "1234", "app", "t1").expect("derive");
        let second = derive_session_secret("w", "1234", "app", "t2").expect("derive");
        assert_ne!(first, second);
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let first = derive_session_secret("ab", "c", "app", "t").expect("derive");
        let second = derive_session_secret("a", "bc", "app", "t").expect("derive");
        assert_ne!(first, second);
    }

    #[test_case("", "u", "r", "t")]
    #[test_case("w", "", "r", "t")]
    #[test_case("w", "u", "", "t")]
    #[test_case("w", "u", "r", "")]
    fn test_empty_inputs_rejected(wallet: &str, unlock: &str, requester: &str, token: &str) {
        match derive_session_secret(wallet, unlock, requester, token) {
            Err(GrantKitError::InvalidInput(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_hex_round_trip_and_malformed() {
        let secret = derive_session_secret("w", "u", "r", "t").expect("derive");
        let parsed = SessionSecret::from_hex(&secret.to_hex()).expect("parse");
        assert_eq!(parsed, secret);

        let truncated = secret.to_hex()[..62].to_string();
        let padded = format!(" {}\n", secret.to_hex());
        for bad in ["", "zz", truncated.as_str(), padded.as_str()] {
            assert!(matches!(
                SessionSecret::from_hex(bad),
                Err(GrantKitError::InvalidSessionSecret)
            ));
        }
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = SessionSecret::from_bytes([7u8; 32]);
        assert_eq!(format!("{secret:?}"), "SessionSecret(<redacted>)");
    }
}
