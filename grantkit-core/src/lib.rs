#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

//! Capability tokens that let mini-applications use wallet keys without ever
//! seeing them.
//!
//! A mini-application asks the [`MiniAppAuthorizer`] for a token; once the user
//! approves, it receives a token id and a session secret. Every later key
//! operation presents both, and is only carried out after the token's sealed
//! payload opens under the secret and grants the operation.

mod authorizer;
pub use authorizer::*;

mod cipher;
pub use cipher::{PayloadCipher, XChaCha20PayloadCipher};

mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

mod error;
pub use error::*;

mod executor;
pub use executor::{
    address_from_public_key, CryptoExecutor, ExecutionResult, KeyPair, OperationParams,
    WalletKeyProvider,
};

pub mod logger;

mod secret;
pub use secret::{derive_session_secret, SessionSecret, SESSION_SECRET_LEN};

pub mod store;

mod token;
pub use token::{Operation, StoredToken, Token, TokenDuration};

uniffi::setup_scaffolding!("grantkit_core");
