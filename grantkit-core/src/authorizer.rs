//! Entry points invoked by the host's mini-application transport.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::cipher::{PayloadCipher, XChaCha20PayloadCipher};
use crate::clock::{Clock, SystemClock};
use crate::error::{GrantKitError, GrantKitResult};
use crate::executor::{CryptoExecutor, ExecutionResult, OperationParams, ResolvedKey, WalletKeyProvider};
use crate::secret::SessionSecret;
use crate::store::{TokenRecordStore, TokenStore};
use crate::token::{normalize_operations, Operation, Token, TokenDuration};

/// Behaviour switches for a [`MiniAppAuthorizer`].
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct AuthorizerConfig {
    /// Sweep expired tokens when the authorizer is initialized.
    pub sweep_on_initialize: bool,
    /// Check at issuance that the approved wallet actually derives the requested address.
    pub verify_address_on_request: bool,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            sweep_on_initialize: true,
            verify_address_on_request: true,
        }
    }
}

/// What a mini-application asks for.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct TokenRequest {
    /// Wire names of the requested operations.
    pub operations: Vec<String>,
    /// Wire name of the requested lifetime (`5min`, `30min`, `2hour`, `1day`).
    pub duration: String,
    /// Address the token should be bound to.
    pub address: String,
    /// Chain the mini-application operates on, shown to the user.
    pub chain_id: Option<String>,
}

/// Details shown to the user by the authorization dialog.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct AuthorizationRequest {
    /// Mini-application asking for access.
    pub requester_id: String,
    /// Address access is requested for.
    pub address: String,
    /// Requested operations.
    pub operations: Vec<Operation>,
    /// Requested lifetime.
    pub duration: TokenDuration,
    /// Chain the mini-application operates on.
    pub chain_id: Option<String>,
}

/// The user's answer to an [`AuthorizationRequest`].
#[derive(Clone, uniffi::Record)]
pub struct AuthorizationDecision {
    /// Whether the user approved.
    pub approved: bool,
    /// Unlock secret collected by the dialog.
    pub unlock_secret: Option<String>,
    /// Wallet the user unlocked.
    pub wallet_id: Option<String>,
    /// Lifetime the user picked, if it differs from the requested one.
    pub selected_duration: Option<TokenDuration>,
}

impl std::fmt::Debug for AuthorizationDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationDecision")
            .field("approved", &self.approved)
            .field("wallet_id", &self.wallet_id)
            .field("selected_duration", &self.selected_duration)
            .finish_non_exhaustive()
    }
}

/// Authorization dialog collaborator.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait AuthorizationPrompt: Send + Sync {
    /// Asks the user to approve `request` and unlock a wallet.
    ///
    /// # Errors
    ///
    /// Returns an error if the dialog cannot be shown.
    async fn request_authorization(
        &self,
        request: AuthorizationRequest,
    ) -> GrantKitResult<AuthorizationDecision>;
}

/// Token handed to a mini-application. The session secret appears only here.
#[derive(Clone, uniffi::Record)]
pub struct TokenGrant {
    /// Token identifier.
    pub token_id: String,
    /// Hex session secret; present it with every `execute` call.
    pub session_secret: String,
    /// Expiry time in unix seconds.
    pub expires_at: u64,
    /// Operations actually granted.
    pub granted_operations: Vec<Operation>,
    /// Address the token is bound to.
    pub address: String,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("token_id", &self.token_id)
            .field("expires_at", &self.expires_at)
            .field("granted_operations", &self.granted_operations)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// A key operation requested with a previously granted token.
#[derive(Clone, uniffi::Record)]
pub struct ExecuteRequest {
    /// Token identifier.
    pub token_id: String,
    /// Hex session secret returned with the grant.
    pub session_secret: String,
    /// Wire name of the operation.
    pub operation: String,
    /// Operation input.
    pub params: OperationParams,
    /// Address the caller expects to act as.
    pub address: Option<String>,
}

/// Authorizes mini-application key operations inside the host wallet.
#[derive(uniffi::Object)]
pub struct MiniAppAuthorizer {
    store: Arc<TokenStore>,
    executor: CryptoExecutor,
    wallet: Arc<dyn WalletKeyProvider>,
    prompt: Arc<dyn AuthorizationPrompt>,
    config: AuthorizerConfig,
}

impl std::fmt::Debug for MiniAppAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiniAppAuthorizer")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl MiniAppAuthorizer {
    /// Creates an authorizer using the default payload cipher and the system clock.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(
        records: Arc<dyn TokenRecordStore>,
        wallet: Arc<dyn WalletKeyProvider>,
        prompt: Arc<dyn AuthorizationPrompt>,
        config: Option<AuthorizerConfig>,
    ) -> Self {
        Self::with_components(
            records,
            wallet,
            prompt,
            Arc::new(XChaCha20PayloadCipher),
            Arc::new(SystemClock),
            config.unwrap_or_default(),
        )
    }

    /// Prepares the token store. Safe to call more than once.
    ///
    /// # Returns
    ///
    /// The number of expired tokens removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the startup sweep fails.
    pub async fn initialize(&self) -> GrantKitResult<u64> {
        self.store.initialize(self.config.sweep_on_initialize).await
    }

    /// Releases the token store. Calls fail with `NotInitialized` afterwards.
    pub fn close(&self) {
        self.store.close();
    }

    /// Handles a mini-application's request for a token.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for malformed requests, `UserRejected` if the user
    /// declines, `AddressMismatch` if the unlocked wallet does not own the
    /// requested address, or a storage failure.
    pub async fn request_token(
        &self,
        requester_id: String,
        request: TokenRequest,
    ) -> GrantKitResult<TokenGrant> {
        self.store.ensure_ready()?;
        if requester_id.is_empty() {
            return Err(GrantKitError::InvalidInput(
                "requester_id must not be empty".to_string(),
            ));
        }
        if request.address.is_empty() {
            return Err(GrantKitError::InvalidInput(
                "address must not be empty".to_string(),
            ));
        }
        let operations = request
            .operations
            .iter()
            .map(String::as_str)
            .map(Operation::parse)
            .collect::<GrantKitResult<Vec<_>>>()?;
        let operations = normalize_operations(&operations)?;
        let duration = TokenDuration::parse(&request.duration)?;

        let mut decision = self
            .prompt
            .request_authorization(AuthorizationRequest {
                requester_id: requester_id.clone(),
                address: request.address.clone(),
                operations: operations.clone(),
                duration,
                chain_id: request.chain_id.clone(),
            })
            .await?;

        if !decision.approved {
            log::info!("user rejected token request from {requester_id}");
            return Err(GrantKitError::UserRejected);
        }
        let (Some(unlock_secret), Some(wallet_id)) =
            (decision.unlock_secret.take(), decision.wallet_id.take())
        else {
            return Err(GrantKitError::Internal(
                "authorization approved without unlock secret or wallet".to_string(),
            ));
        };
        let unlock_secret = SecretString::from(unlock_secret);
        let duration = decision.selected_duration.unwrap_or(duration);

        if self.config.verify_address_on_request {
            self.verify_wallet_address(&wallet_id, &unlock_secret, &request.address)
                .await?;
        }

        let (token, session_secret) = self
            .store
            .create_token(
                &requester_id,
                &wallet_id,
                &request.address,
                &operations,
                duration,
                &unlock_secret,
            )
            .await?;

        Ok(TokenGrant {
            token_id: token.token_id,
            session_secret: session_secret.to_hex(),
            expires_at: token.expires_at,
            granted_operations: token.operations,
            address: token.address,
        })
    }

    /// Performs a key operation with a previously granted token.
    ///
    /// # Errors
    ///
    /// Any token rejection unchanged, `AddressMismatch`, or `InvalidInput` for
    /// malformed parameters.
    pub async fn execute(
        &self,
        requester_id: String,
        request: ExecuteRequest,
    ) -> GrantKitResult<ExecutionResult> {
        self.store.ensure_ready()?;
        let operation = Operation::parse(&request.operation)?;
        let session_secret = SessionSecret::from_hex(&request.session_secret)?;
        self.executor
            .execute(
                &request.token_id,
                &session_secret,
                operation,
                &request.params,
                &requester_id,
                request.address.as_deref(),
            )
            .await
    }

    /// Revokes a token held by `requester_id`.
    ///
    /// The caller must present the token's session secret. A token that no
    /// longer exists or has already expired counts as revoked.
    ///
    /// # Errors
    ///
    /// `InvalidSessionSecret` or `MiniappMismatch` if the caller does not hold
    /// the token, or a storage failure.
    pub async fn revoke_token(
        &self,
        requester_id: String,
        token_id: String,
        session_secret: String,
    ) -> GrantKitResult<()> {
        self.store.ensure_ready()?;
        let session_secret = SessionSecret::from_hex(&session_secret)?;
        match self
            .store
            .authenticate_token(&token_id, &session_secret, &requester_id)
            .await
        {
            Ok(_) => {
                self.store.delete_token(&token_id).await?;
                log::info!("requester {requester_id} revoked token {token_id}");
                Ok(())
            }
            Err(GrantKitError::TokenNotFound | GrantKitError::TokenExpired) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Lists the live tokens held by `requester_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not ready or the query fails.
    pub async fn list_tokens(&self, requester_id: String) -> GrantKitResult<Vec<Token>> {
        self.store.list_by_requester(&requester_id).await
    }

    /// Removes every expired token.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not ready or a storage call fails.
    pub async fn sweep_expired(&self) -> GrantKitResult<u64> {
        self.store.sweep_expired().await
    }
}

/// Implementation not exposed to foreign bindings
impl MiniAppAuthorizer {
    /// Creates an authorizer from explicit components.
    #[must_use]
    pub fn with_components(
        records: Arc<dyn TokenRecordStore>,
        wallet: Arc<dyn WalletKeyProvider>,
        prompt: Arc<dyn AuthorizationPrompt>,
        cipher: Arc<dyn PayloadCipher>,
        clock: Arc<dyn Clock>,
        config: AuthorizerConfig,
    ) -> Self {
        let store = Arc::new(TokenStore::new(records, cipher, clock));
        let executor = CryptoExecutor::new(store.clone(), wallet.clone());
        Self {
            store,
            executor,
            wallet,
            prompt,
            config,
        }
    }

    /// The underlying token store.
    #[must_use]
    pub const fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    async fn verify_wallet_address(
        &self,
        wallet_id: &str,
        unlock_secret: &SecretString,
        address: &str,
    ) -> GrantKitResult<()> {
        let mut key_pair = self
            .wallet
            .resolve_key_pair(wallet_id.to_string(), unlock_secret.expose_secret().to_string())
            .await?;
        let resolved = ResolvedKey::from_key_pair(&key_pair);
        key_pair.secret_key.zeroize();
        if resolved?.address() != address {
            log::warn!("approved wallet {wallet_id} does not own address {address}");
            return Err(GrantKitError::AddressMismatch);
        }
        Ok(())
    }
}
