use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::ledger::LedgerContract;
use crate::types::{DocumentId, Identity, Receipt, TxHash};

/// Document stored by the simulated contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub fingerprint: String,
    pub storage_path: String,
    pub owner: Identity,
    pub tx_hash: TxHash,
    pub block_number: u64,
}

/// Write broadcast but not yet confirmed.
#[derive(Debug, Clone)]
struct PendingWrite {
    fingerprint: String,
    storage_path: String,
    owner: Identity,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerBook {
    next_document_id: u64,
    block_height: u64,
    nonce: u64,
    documents: BTreeMap<u64, StoredDocument>,
    #[serde(skip)]
    pending: HashMap<TxHash, PendingWrite>,
}

/// In-process stand-in for the document registry contract.
///
/// Document ids are assigned sequentially from 1 on confirmation. When opened
/// from a path, every confirmed write is flushed back to that JSON file.
pub struct SimulatedLedger {
    address: String,
    book: Mutex<LedgerBook>,
    persist_to: Option<PathBuf>,
    fail_writes: Mutex<Option<String>>, // message returned by the next writes, if set
}

impl SimulatedLedger {
    pub fn new(address: impl Into<String>) -> Self {
        SimulatedLedger {
            address: address.into(),
            book: Mutex::new(LedgerBook {
                next_document_id: 1,
                ..LedgerBook::default()
            }),
            persist_to: None,
            fail_writes: Mutex::new(None),
        }
    }

    /// Load the book from `path` (empty if the file does not exist yet).
    pub fn open(address: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let mut ledger = SimulatedLedger::new(address);

        if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| LedgerError::Storage(format!("read failed: {e}")))?;
            let mut book: LedgerBook =
                serde_json::from_str(&raw).map_err(|e| LedgerError::Storage(format!("corrupt ledger file: {e}")))?;
            book.next_document_id = book.next_document_id.max(1);
            debug!(path = %path.display(), documents = book.documents.len(), "loaded simulated ledger");
            ledger.book = Mutex::new(book);
        }

        ledger.persist_to = Some(path.to_path_buf());
        Ok(ledger)
    }

    /// Make every following write fail with `message` (e.g. a rejected signature prompt).
    pub fn fail_writes(&self, message: Option<&str>) {
        if let Ok(mut slot) = self.fail_writes.lock() {
            *slot = message.map(str::to_string);
        }
    }

    pub fn document(&self, id: DocumentId) -> Option<StoredDocument> {
        self.book().ok()?.documents.get(&id.0).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.book().map(|b| b.documents.len()).unwrap_or(0)
    }

    fn book(&self) -> Result<MutexGuard<'_, LedgerBook>, LedgerError> {
        self.book.lock().map_err(|_| LedgerError::Storage("ledger lock poisoned".to_string()))
    }

    async fn persist(&self) -> Result<(), LedgerError> {
        let Some(path) = &self.persist_to else {
            return Ok(());
        };

        let raw = {
            let book = self.book()?;
            serde_json::to_vec_pretty(&*book).map_err(|e| LedgerError::Storage(format!("serialization failed: {e}")))?
        };

        tokio::fs::write(path, raw)
            .await
            .map_err(|e| LedgerError::Storage(format!("write failed: {e}")))
    }
}

#[async_trait]
impl LedgerContract for SimulatedLedger {
    fn address(&self) -> &str {
        &self.address
    }

    async fn set_document(&self, from: &Identity, fingerprint_hex: &str, storage_path: &str) -> Result<TxHash, LedgerError> {
        if let Some(message) = self.fail_writes.lock().ok().and_then(|slot| slot.clone()) {
            return Err(LedgerError::Rejected(message));
        }

        let mut book = self.book()?;
        book.nonce += 1;

        let mut hasher = Sha256::new();
        hasher.update(self.address.as_bytes());
        hasher.update(from.as_str().to_ascii_lowercase().as_bytes());
        hasher.update(fingerprint_hex.as_bytes());
        hasher.update(storage_path.as_bytes());
        hasher.update(book.nonce.to_be_bytes());
        let tx_hash = TxHash(format!("0x{}", hex::encode(hasher.finalize())));

        book.pending.insert(
            tx_hash.clone(),
            PendingWrite {
                fingerprint: fingerprint_hex.to_string(),
                storage_path: storage_path.to_string(),
                owner: from.clone(),
            },
        );

        debug!(tx = %tx_hash, "document write broadcast");
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(&self, tx: &TxHash) -> Result<Receipt, LedgerError> {
        let receipt = {
            let mut book = self.book()?;
            let write = book
                .pending
                .remove(tx)
                .ok_or_else(|| LedgerError::UnknownTransaction(tx.to_string()))?;

            book.block_height += 1;
            let block_number = book.block_height;
            let id = book.next_document_id;
            book.next_document_id += 1;

            book.documents.insert(
                id,
                StoredDocument {
                    fingerprint: write.fingerprint,
                    storage_path: write.storage_path,
                    owner: write.owner,
                    tx_hash: tx.clone(),
                    block_number,
                },
            );

            Receipt {
                tx_hash: tx.clone(),
                document_id: Some(DocumentId(id)),
                block_number,
            }
        };

        self.persist().await?;
        info!(tx = %tx, block = receipt.block_number, "document write confirmed");
        Ok(receipt)
    }

    async fn get_document_hash(&self, id: DocumentId) -> Result<String, LedgerError> {
        let book = self.book()?;
        // Unset keys read back as the empty string, like a contract mapping
        Ok(book.documents.get(&id.0).map(|d| d.fingerprint.clone()).unwrap_or_default())
    }
}
