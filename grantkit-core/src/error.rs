use strum::IntoStaticStr;
use thiserror::Error;

/// Result type for `GrantKit` operations.
pub type GrantKitResult<T, E = GrantKitError> = std::result::Result<T, E>;

/// Error outputs from `GrantKit`.
///
/// Every rejection produced while validating a token is surfaced to the
/// requesting mini-application as-is, so it can decide whether to ask the
/// user for a new authorization.
#[derive(Debug, Error, IntoStaticStr, uniffi::Error)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantKitError {
    /// No token is stored under the given id.
    #[error("token_not_found")]
    TokenNotFound,
    /// The session secret does not open the token payload.
    #[error("invalid_session_secret")]
    InvalidSessionSecret,
    /// The token was issued to a different mini-application.
    #[error("miniapp_mismatch")]
    MiniappMismatch,
    /// The token is past its expiry time.
    #[error("token_expired")]
    TokenExpired,
    /// The token does not grant the requested operation.
    #[error("action_not_permitted")]
    ActionNotPermitted,
    /// The address expected by the caller is not the one bound to the token.
    #[error("address_mismatch")]
    AddressMismatch,
    /// The user declined the authorization prompt.
    #[error("user_rejected")]
    UserRejected,
    /// The presented input is not valid for the requested operation.
    #[error("invalid_input: {0}")]
    InvalidInput(String),
    /// The token store has not been initialized, or has been closed.
    #[error("not_initialized")]
    NotInitialized,
    /// Errors coming from the persistent token record store.
    #[error("storage_error: {0}")]
    Storage(String),
    /// Unexpected error serializing information.
    #[error("serialization_error: {0}")]
    Serialization(String),
    /// Internal failure that the caller cannot recover from.
    #[error("internal_error: {0}")]
    Internal(String),
    /// Unexpected `UniFFI` callback error.
    #[error("unexpected_uniffi_callback_error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl GrantKitError {
    /// Returns the stable wire code for this error, e.g. `TOKEN_NOT_FOUND`.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for GrantKitError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(GrantKitError::TokenNotFound, "TOKEN_NOT_FOUND")]
    #[test_case(GrantKitError::InvalidSessionSecret, "INVALID_SESSION_SECRET")]
    #[test_case(GrantKitError::MiniappMismatch, "MINIAPP_MISMATCH")]
    #[test_case(GrantKitError::TokenExpired, "TOKEN_EXPIRED")]
    #[test_case(GrantKitError::ActionNotPermitted, "ACTION_NOT_PERMITTED")]
    #[test_case(GrantKitError::AddressMismatch, "ADDRESS_MISMATCH")]
    #[test_case(GrantKitError::UserRejected, "USER_REJECTED")]
    #[test_case(GrantKitError::InvalidInput("x".to_string()), "INVALID_INPUT")]
    fn test_error_codes(error: GrantKitError, code: &str) {
        assert_eq!(error.code(), code);
    }
}
