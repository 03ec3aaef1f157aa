//! Session surface.
//!
//! Owns the collaborators of one operator session and hands out the single
//! attestation and verification workflow of that session. Opening the surface
//! registers the account-switch subscription and the telemetry channel;
//! closing (or dropping) it releases both.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clipboard::Clipboard;
use crate::config::EngineConfig;
use crate::error::WorkflowError;
use crate::identity::{IdentityBinding, IdentityPolicy};
use crate::ledger::{LedgerContract, StorageLayout};
use crate::telemetry::{TelemetryChannel, TelemetryListener};
use crate::types::{Identity, TxHash};
use crate::wallet::{self, AccountOverview, WalletProvider};
use crate::workflow::pipeline::PipelineDeps;
use crate::workflow::{AttestationWorkflow, VerificationWorkflow};

/// External systems a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// `None` when no wallet provider is installed; every workflow stage then
    /// fails with `ProviderAbsent`.
    pub provider: Option<Arc<dyn WalletProvider>>,
    pub ledger: Arc<dyn LedgerContract>,
    pub clipboard: Option<Arc<dyn Clipboard>>,
}

pub struct Surface {
    session_id: Uuid,
    provider: Option<Arc<dyn WalletProvider>>,
    identity: Arc<IdentityBinding>,
    telemetry: Arc<TelemetryChannel>,
    attestation: AttestationWorkflow,
    verification: VerificationWorkflow,
    subscription: Option<JoinHandle<()>>,
}

impl Surface {
    /// Open a session. Must be called from within a tokio runtime.
    ///
    /// Returns the telemetry listener when telemetry is enabled.
    pub fn open(config: EngineConfig, collaborators: Collaborators) -> (Self, Option<TelemetryListener>) {
        let session_id = Uuid::new_v4();
        let Collaborators { provider, ledger, clipboard } = collaborators;

        let identity = Arc::new(IdentityBinding::new());
        let subscription = match &provider {
            Some(provider) => Some(identity.follow(provider.as_ref())),
            None => {
                warn!(session = %session_id, "no wallet provider detected");
                None
            }
        };

        let (telemetry, listener) = if config.telemetry_enabled {
            let (channel, listener) = TelemetryChannel::open(config.telemetry_buffer);
            (Arc::new(channel), Some(listener))
        } else {
            (Arc::new(TelemetryChannel::disabled()), None)
        };

        let deps = || PipelineDeps {
            provider: provider.clone(),
            identity: Arc::clone(&identity),
            telemetry: Arc::clone(&telemetry),
            clipboard: clipboard.clone(),
            max_file_size: config.max_file_size,
        };

        let attestation = AttestationWorkflow::new(
            deps(),
            Arc::clone(&ledger),
            StorageLayout::new(&config.storage_directory, &config.storage_stem),
        );
        let verification = VerificationWorkflow::new(
            deps(),
            IdentityPolicy::for_required(config.required_identity.clone()),
            Arc::clone(&ledger),
        );

        info!(
            session = %session_id,
            contract = ledger.address(),
            required_identity = ?config.required_identity.as_ref().map(|i| i.to_string()),
            telemetry = listener.is_some(),
            "surface opened"
        );

        let surface = Surface {
            session_id,
            provider,
            identity,
            telemetry,
            attestation,
            verification,
            subscription,
        };
        (surface, listener)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The session's attestation workflow (shared state across calls).
    pub fn attestation(&self) -> AttestationWorkflow {
        self.attestation.clone()
    }

    /// The session's verification workflow (shared state across calls).
    pub fn verification(&self) -> VerificationWorkflow {
        self.verification.clone()
    }

    /// Currently active identity, as last reported by the provider.
    pub fn identity(&self) -> Option<Identity> {
        self.identity.current()
    }

    pub fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.watch()
    }

    fn provider(&self) -> Result<&Arc<dyn WalletProvider>, WorkflowError> {
        self.provider.as_ref().ok_or(WorkflowError::ProviderAbsent)
    }

    /// Bind the active identity without any policy (balance view).
    pub async fn connect(&self) -> Result<Identity, WorkflowError> {
        let provider = self.provider()?;
        self.identity.request_connection(provider.as_ref()).await
    }

    /// Balance of the active identity.
    pub async fn account_overview(&self) -> Result<AccountOverview, WorkflowError> {
        let provider = self.provider()?;
        let identity = self.identity.current().ok_or(WorkflowError::NotConnected)?;
        wallet::account_overview(provider.as_ref(), &identity).await
    }

    /// Send `amount` ether from the active identity to `to`.
    pub async fn transfer(&self, to: &str, amount: &str) -> Result<TxHash, WorkflowError> {
        let provider = self.provider()?;
        let identity = self.identity.current().ok_or(WorkflowError::NotConnected)?;
        wallet::transfer(provider.as_ref(), &identity, to, amount).await
    }

    /// Release the account subscription and close telemetry.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.telemetry.close();
        if let Some(subscription) = self.subscription.take() {
            subscription.abort();
            info!(session = %self.session_id, "surface closed");
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.shutdown();
    }
}
