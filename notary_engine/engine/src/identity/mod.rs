//! Identity binding.
//!
//! This module:
//!     Requests the active account from the wallet provider
//!     Follows provider-pushed account switches into one watch cell
//!     Decides which identities a workflow accepts

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::WorkflowError;
use crate::types::Identity;
use crate::wallet::WalletProvider;

/// Which connected identities a workflow accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Any connected identity.
    Unrestricted,
    /// Exactly one identity (hex case ignored).
    RestrictedTo(Identity),
}

impl IdentityPolicy {
    pub fn for_required(required: Option<Identity>) -> Self {
        match required {
            Some(identity) => IdentityPolicy::RestrictedTo(identity),
            None => IdentityPolicy::Unrestricted,
        }
    }

    /// Check if `identity` is authorized under this policy
    pub fn check(&self, identity: &Identity) -> Result<(), WorkflowError> {
        match self {
            IdentityPolicy::Unrestricted => Ok(()),
            IdentityPolicy::RestrictedTo(expected) if expected == identity => Ok(()),
            IdentityPolicy::RestrictedTo(expected) => Err(WorkflowError::WrongIdentity {
                expected: expected.to_string(),
                actual: identity.to_string(),
            }),
        }
    }
}

/// Holder of the currently active identity.
///
/// The provider owns the identity; this cell mirrors it. Only this type writes
/// the cell (on connection and on provider pushes), workflows read it.
pub struct IdentityBinding {
    cell: watch::Sender<Option<Identity>>,
}

impl Default for IdentityBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityBinding {
    pub fn new() -> Self {
        let (cell, _) = watch::channel(None);
        IdentityBinding { cell }
    }

    pub fn current(&self) -> Option<Identity> {
        self.cell.borrow().clone()
    }

    /// Receiver notified on every identity change.
    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.cell.subscribe()
    }

    /// Ask the provider for accounts and bind the first one.
    pub async fn request_connection(&self, provider: &dyn WalletProvider) -> Result<Identity, WorkflowError> {
        let accounts = provider
            .request_accounts()
            .await
            .map_err(|e| WorkflowError::Connection(e.to_string()))?;

        let identity = accounts
            .into_iter()
            .next()
            .ok_or_else(|| WorkflowError::Connection("provider returned no accounts".to_string()))?;

        self.cell.send_replace(Some(identity.clone()));
        info!(identity = %identity, "wallet connected");
        Ok(identity)
    }

    /// Subscribe to the provider's account switches for the lifetime of the
    /// returned task. Register once per surface.
    pub fn follow(self: &Arc<Self>, provider: &dyn WalletProvider) -> JoinHandle<()> {
        let mut changes = provider.accounts_changed();
        let binding = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(accounts) => {
                        let next = accounts.into_iter().next();
                        match &next {
                            Some(identity) => info!(identity = %identity, "wallet account changed"),
                            None => info!("wallet disconnected all accounts"),
                        }
                        binding.cell.send_replace(next);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed account change notifications");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("account change stream closed");
                        break;
                    }
                }
            }
        })
    }
}
