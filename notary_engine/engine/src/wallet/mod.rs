//! Wallet provider interface plus the account overview and native transfer operations.

pub mod simulated;
pub mod units;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::{ProviderError, WorkflowError};
use crate::types::{Identity, TxHash};

pub use simulated::SimulatedWallet;

/// Native-asset transfer, shaped like an `eth_sendTransaction` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    pub from: Identity,
    pub to: Identity,
    pub value: String, // 0x-prefixed wei quantity
}

/// Injected wallet (browser extension, hardware wallet, simulator).
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the user to expose accounts. The first one is the active identity.
    async fn request_accounts(&self) -> Result<Vec<Identity>, ProviderError>;

    /// Pushes the new account list whenever the user switches accounts.
    fn accounts_changed(&self) -> broadcast::Receiver<Vec<Identity>>;

    /// Balance in wei.
    async fn get_balance(&self, who: &Identity) -> Result<u128, ProviderError>;

    async fn send_transaction(&self, request: &TransferRequest) -> Result<TxHash, ProviderError>;
}

/// Balance of the bound identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountOverview {
    pub identity: Identity,
    pub balance_wei: u128,
    pub balance: String, // ether, formatted
}

pub async fn account_overview(provider: &dyn WalletProvider, identity: &Identity) -> Result<AccountOverview, WorkflowError> {
    let balance_wei = provider
        .get_balance(identity)
        .await
        .map_err(|e| WorkflowError::Connection(e.to_string()))?;

    Ok(AccountOverview {
        identity: identity.clone(),
        balance_wei,
        balance: units::format_ether(balance_wei),
    })
}

/// Send `amount` ether from `from` to `to`.
pub async fn transfer(provider: &dyn WalletProvider, from: &Identity, to: &str, amount: &str) -> Result<TxHash, WorkflowError> {
    let to = Identity::parse(to)?;
    let wei = units::parse_ether(amount)?;

    let request = TransferRequest {
        from: from.clone(),
        to,
        value: units::to_quantity_hex(wei),
    };

    match provider.send_transaction(&request).await {
        Ok(tx) => {
            info!(tx = %tx, to = %request.to, value = %request.value, "transfer sent");
            Ok(tx)
        }
        Err(e) => {
            warn!(error = %e, "transfer failed");
            Err(WorkflowError::Transaction(e.to_string()))
        }
    }
}
