pub mod simulated;
pub mod storage_path;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::types::{DocumentId, Identity, Receipt, TxHash};

pub use simulated::SimulatedLedger;
pub use storage_path::{StorageLayout, file_extension};

/// Document registry contract on the ledger.
///
/// Writes are two-phase: `set_document` broadcasts and returns the transaction
/// hash, `wait_for_confirmation` resolves once the write is final.
#[async_trait]
pub trait LedgerContract: Send + Sync {
    /// Contract address, for logs and status lines.
    fn address(&self) -> &str;

    /// Store `fingerprint_hex` with its storage path, signed by `from`.
    async fn set_document(&self, from: &Identity, fingerprint_hex: &str, storage_path: &str) -> Result<TxHash, LedgerError>;

    async fn wait_for_confirmation(&self, tx: &TxHash) -> Result<Receipt, LedgerError>;

    /// Fingerprint stored under `id`; empty when nothing was stored.
    async fn get_document_hash(&self, id: DocumentId) -> Result<String, LedgerError>;
}
