//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ed25519_dalek::SigningKey;
use grantkit_core::store::InMemoryTokenRecordStore;
use grantkit_core::{
    address_from_public_key, AuthorizationDecision, AuthorizationPrompt, AuthorizationRequest,
    AuthorizerConfig, GrantKitError, GrantKitResult, KeyPair, ManualClock, MiniAppAuthorizer,
    WalletKeyProvider, XChaCha20PayloadCipher,
};

/// Clock reading every harness starts at.
pub const START: u64 = 1_700_000_000;
/// The one wallet known to the harness wallet provider.
pub const WALLET_ID: &str = "wallet-main";
/// Unlock secret of [`WALLET_ID`].
pub const UNLOCK_SECRET: &str = "0-1-2-5-8";
/// Mini-application used by most tests.
pub const REQUESTER: &str = "app.example.swap";

/// Wallet storage holding one Ed25519 seed per wallet id.
#[derive(Default)]
pub struct InMemoryWallet {
    wallets: HashMap<String, (String, [u8; 32])>,
}

impl InMemoryWallet {
    /// Registers a wallet unlocked by `unlock_secret`.
    pub fn with_wallet(mut self, wallet_id: &str, unlock_secret: &str, seed: [u8; 32]) -> Self {
        self.wallets
            .insert(wallet_id.to_string(), (unlock_secret.to_string(), seed));
        self
    }
}

#[async_trait::async_trait]
impl WalletKeyProvider for InMemoryWallet {
    async fn resolve_key_pair(
        &self,
        wallet_id: String,
        unlock_secret: String,
    ) -> GrantKitResult<KeyPair> {
        let (expected_secret, seed) = self
            .wallets
            .get(&wallet_id)
            .ok_or_else(|| GrantKitError::Internal(format!("unknown wallet {wallet_id}")))?;
        if *expected_secret != unlock_secret {
            return Err(GrantKitError::InvalidSessionSecret);
        }
        let signing_key = SigningKey::from_bytes(seed);
        Ok(KeyPair {
            secret_key: seed.to_vec(),
            public_key: signing_key.verifying_key().to_bytes().to_vec(),
        })
    }
}

/// Authorization dialog that answers every request with a fixed decision.
pub struct ScriptedPrompt {
    decision: AuthorizationDecision,
    requests: Mutex<Vec<AuthorizationRequest>>,
}

impl ScriptedPrompt {
    /// Approves every request, unlocking `wallet_id`.
    pub fn approving(wallet_id: &str, unlock_secret: &str) -> Self {
        Self::with_decision(AuthorizationDecision {
            approved: true,
            unlock_secret: Some(unlock_secret.to_string()),
            wallet_id: Some(wallet_id.to_string()),
            selected_duration: None,
        })
    }

    /// Rejects every request.
    pub fn rejecting() -> Self {
        Self::with_decision(AuthorizationDecision {
            approved: false,
            unlock_secret: None,
            wallet_id: None,
            selected_duration: None,
        })
    }

    /// Answers every request with `decision`.
    pub fn with_decision(decision: AuthorizationDecision) -> Self {
        Self {
            decision,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests shown to the user so far.
    pub fn requests(&self) -> Vec<AuthorizationRequest> {
        self.requests.lock().expect("prompt mutex").clone()
    }
}

#[async_trait::async_trait]
impl AuthorizationPrompt for ScriptedPrompt {
    async fn request_authorization(
        &self,
        request: AuthorizationRequest,
    ) -> GrantKitResult<AuthorizationDecision> {
        self.requests.lock().expect("prompt mutex").push(request);
        Ok(self.decision.clone())
    }
}

/// Ed25519 seed of [`WALLET_ID`].
pub fn seed() -> [u8; 32] {
    [0x21u8; 32]
}

/// Address derived from [`seed`].
pub fn wallet_address() -> String {
    address_from_public_key(&SigningKey::from_bytes(&seed()).verifying_key())
}

/// An initialized authorizer with handles on its collaborators.
pub struct Harness {
    /// Backing record store.
    pub records: Arc<InMemoryTokenRecordStore>,
    /// Clock driving expiry.
    pub clock: Arc<ManualClock>,
    /// Authorization dialog.
    pub prompt: Arc<ScriptedPrompt>,
    /// Authorizer under test.
    pub authorizer: MiniAppAuthorizer,
}

/// Builds and initializes an authorizer using `prompt` and `config`.
pub async fn harness_with_config(prompt: ScriptedPrompt, config: AuthorizerConfig) -> Harness {
    let records = Arc::new(InMemoryTokenRecordStore::new());
    let clock = Arc::new(ManualClock::new(START));
    let prompt = Arc::new(prompt);
    let wallet = InMemoryWallet::default().with_wallet(WALLET_ID, UNLOCK_SECRET, seed());
    let authorizer = MiniAppAuthorizer::with_components(
        records.clone(),
        Arc::new(wallet),
        prompt.clone(),
        Arc::new(XChaCha20PayloadCipher),
        clock.clone(),
        config,
    );
    authorizer.initialize().await.expect("initialize");
    Harness {
        records,
        clock,
        prompt,
        authorizer,
    }
}

/// Harness with default configuration answering through `prompt`.
pub async fn harness_with_prompt(prompt: ScriptedPrompt) -> Harness {
    harness_with_config(prompt, AuthorizerConfig::default()).await
}

/// Harness whose prompt approves every request.
pub async fn harness() -> Harness {
    harness_with_prompt(ScriptedPrompt::approving(WALLET_ID, UNLOCK_SECRET)).await
}
