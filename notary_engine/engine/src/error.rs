//! Centralized notary engine error types.

use thiserror::Error;

/// Terminal failure of a workflow stage.
///
/// Every error raised inside a stage is caught at the stage boundary and
/// stored on the workflow as `Stage::Failed`, so the type is `Clone`.
/// A fingerprint mismatch is not represented here: it is a successful
/// comparison with `Verdict::Mismatch`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// No wallet provider is available. Fatal for the whole workflow.
    #[error("no wallet provider detected")]
    ProviderAbsent,
    /// The provider refused or failed the account request.
    #[error("wallet connection failed: {0}")]
    Connection(String),
    /// The connected identity is not the one the workflow is restricted to.
    #[error("wrong wallet connected: expected {expected}, got {actual}")]
    WrongIdentity { expected: String, actual: String },
    /// Declared or streamed size exceeded the configured maximum.
    #[error("file of {size} bytes exceeds the {max}-byte limit")]
    FileTooLarge { size: u64, max: u64 },
    /// Stream read or digest failure.
    #[error("hash computation failed: {0}")]
    HashComputation(String),
    /// Any failure of the ledger write or read call, message kept verbatim.
    #[error("ledger call failed: {0}")]
    LedgerCall(String),
    #[error("no file selected")]
    NoFileSelected,
    #[error("wallet not connected")]
    NotConnected,
    #[error("document id is required")]
    MissingDocumentId,
    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),
    /// The fingerprint of the selected file is not (or no longer) available.
    #[error("file fingerprint is not available")]
    FingerprintUnavailable,
    #[error("an exchange is already in progress")]
    ExchangeInProgress,
    /// A newer file selection replaced the one this operation started with.
    #[error("superseded by a newer file selection")]
    Superseded,
    /// Native transfer rejected by the provider.
    #[error("transaction failed: {0}")]
    Transaction(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("clipboard error: {0}")]
    Clipboard(String),
}

impl WorkflowError {
    /// Only a missing provider ends the workflow for good; everything else can
    /// be retried by re-invoking the failed stage.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkflowError::ProviderAbsent)
    }
}

/// Failure reported by a wallet provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The user declined the request in the wallet.
    #[error("user rejected the request: {0}")]
    Rejected(String),
    #[error("unknown account: {0}")]
    UnknownAccount(String),
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("provider error: {0}")]
    Other(String),
}

/// Failure reported by the ledger contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),
    /// Local persistence of the ledger book failed.
    #[error("ledger storage error: {0}")]
    Storage(String),
}

/// Parsing of user-supplied identities and amounts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid wallet address: {0}")]
    InvalidIdentity(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

impl From<ParseError> for WorkflowError {
    fn from(err: ParseError) -> Self {
        WorkflowError::InvalidInput(err.to_string())
    }
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
