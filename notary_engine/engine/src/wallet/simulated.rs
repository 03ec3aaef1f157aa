use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::ProviderError;
use crate::types::{Identity, TxHash};
use crate::wallet::units::parse_quantity_hex;
use crate::wallet::{TransferRequest, WalletProvider};

struct WalletState {
    accounts: Vec<Identity>, // first entry is the active account
    balances: HashMap<Identity, u128>,
    nonce: u64,
    reject: Option<String>,
}

/// In-memory wallet with switchable accounts and balances.
pub struct SimulatedWallet {
    state: Mutex<WalletState>,
    changes: broadcast::Sender<Vec<Identity>>,
}

impl SimulatedWallet {
    /// Every account starts with `initial_balance` wei.
    pub fn new(accounts: Vec<Identity>, initial_balance: u128) -> Self {
        let balances = accounts.iter().map(|a| (a.clone(), initial_balance)).collect();
        let (changes, _) = broadcast::channel(16);

        SimulatedWallet {
            state: Mutex::new(WalletState {
                accounts,
                balances,
                nonce: 0,
                reject: None,
            }),
            changes,
        }
    }

    /// Make `account` the active one (adding it if unknown) and notify subscribers.
    pub fn switch_account(&self, account: Identity) {
        let accounts = {
            let mut state = self.state();
            state.accounts.retain(|a| *a != account);
            state.accounts.insert(0, account.clone());
            state.balances.entry(account).or_insert(0);
            state.accounts.clone()
        };

        // No subscribers is fine
        let _ = self.changes.send(accounts);
    }

    /// Simulate the user declining every prompt.
    pub fn reject_requests(&self, reason: Option<&str>) {
        self.state().reject = reason.map(str::to_string);
    }

    pub fn balance_of(&self, who: &Identity) -> u128 {
        self.state().balances.get(who).copied().unwrap_or(0)
    }

    fn state(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl WalletProvider for SimulatedWallet {
    async fn request_accounts(&self) -> Result<Vec<Identity>, ProviderError> {
        let state = self.state();
        if let Some(reason) = &state.reject {
            return Err(ProviderError::Rejected(reason.clone()));
        }
        Ok(state.accounts.clone())
    }

    fn accounts_changed(&self) -> broadcast::Receiver<Vec<Identity>> {
        self.changes.subscribe()
    }

    async fn get_balance(&self, who: &Identity) -> Result<u128, ProviderError> {
        Ok(self.balance_of(who))
    }

    async fn send_transaction(&self, request: &TransferRequest) -> Result<TxHash, ProviderError> {
        let value = parse_quantity_hex(&request.value).map_err(|e| ProviderError::Other(e.to_string()))?;

        let mut state = self.state();
        if let Some(reason) = &state.reject {
            return Err(ProviderError::Rejected(reason.clone()));
        }
        if !state.accounts.contains(&request.from) {
            return Err(ProviderError::UnknownAccount(request.from.to_string()));
        }

        let available = state.balances.get(&request.from).copied().unwrap_or(0);
        if available < value {
            return Err(ProviderError::InsufficientFunds(format!(
                "balance {available} wei, transfer {value} wei"
            )));
        }

        state.balances.insert(request.from.clone(), available - value);
        *state.balances.entry(request.to.clone()).or_insert(0) += value;
        state.nonce += 1;

        let mut hasher = Sha256::new();
        hasher.update(request.from.as_str().to_ascii_lowercase().as_bytes());
        hasher.update(request.to.as_str().to_ascii_lowercase().as_bytes());
        hasher.update(request.value.as_bytes());
        hasher.update(state.nonce.to_be_bytes());
        let tx = TxHash(format!("0x{}", hex::encode(hasher.finalize())));

        debug!(tx = %tx, "simulated transfer applied");
        Ok(tx)
    }
}
