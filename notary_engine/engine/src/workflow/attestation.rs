use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{LedgerError, WorkflowError};
use crate::fingerprint::FileHandle;
use crate::identity::IdentityPolicy;
use crate::ledger::{LedgerContract, StorageLayout};
use crate::telemetry::{SessionEvent, now_rfc3339};
use crate::types::{Fingerprint, Identity, Receipt, StoragePath};
use crate::workflow::pipeline::{ExchangeSlot, Pipeline, PipelineDeps};
use crate::workflow::{Certification, Stage, Status, WorkflowSnapshot};

/// Records a document's fingerprint on the ledger.
///
/// Any connected identity may attest. Clones share one state.
#[derive(Clone)]
pub struct AttestationWorkflow {
    pipeline: Arc<Pipeline>,
    ledger: Arc<dyn LedgerContract>,
    layout: StorageLayout,
}

impl AttestationWorkflow {
    pub(crate) fn new(deps: PipelineDeps, ledger: Arc<dyn LedgerContract>, layout: StorageLayout) -> Self {
        AttestationWorkflow {
            pipeline: Arc::new(Pipeline::new("attestation", IdentityPolicy::Unrestricted, deps)),
            ledger,
            layout,
        }
    }

    /// Bind the provider's active identity.
    pub async fn connect(&self) -> Result<Identity, WorkflowError> {
        self.pipeline.connect().await
    }

    /// Select a file and compute its fingerprint.
    pub async fn select_file(&self, file: FileHandle) -> Result<Fingerprint, WorkflowError> {
        self.pipeline.select_file(file).await
    }

    pub fn clear(&self) {
        self.pipeline.clear();
    }

    pub async fn copy_fingerprint(&self) -> Result<(), WorkflowError> {
        let fingerprint = self.pipeline.state().fingerprint.as_ref().map(|f| f.to_string());
        self.pipeline.copy_text(fingerprint, "Hash").await
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.pipeline.snapshot()
    }

    pub fn stage(&self) -> Stage {
        self.pipeline.state().stage.clone()
    }

    /// Submit the current fingerprint and wait until the write is final.
    ///
    /// On success the file is released and the fingerprint stays available
    /// for copying. Ledger failures surface verbatim as `LedgerCall`.
    pub async fn submit(&self) -> Result<Certification, WorkflowError> {
        let pipeline = self.pipeline.as_ref();
        pipeline.provider()?;

        // STEP 1: Check preconditions and claim the exchange
        let (file, identity, fingerprint, generation) = {
            let mut st = pipeline.state();
            if st.exchanging {
                return Err(WorkflowError::ExchangeInProgress);
            }
            let inputs = pipeline.exchange_inputs(&st);
            let (file, identity, fingerprint) = match inputs {
                Ok(inputs) => inputs,
                Err(err) => {
                    drop(st);
                    return Err(pipeline.fail(err));
                }
            };
            st.exchanging = true;
            st.stage = Stage::Submitting;
            st.status = Some(Status::info("Sending fingerprint to the ledger..."));
            (file, identity, fingerprint, pipeline.current_generation())
        };
        let _slot = ExchangeSlot::claimed(pipeline);

        // STEP 2: Derive the storage path and write
        let storage_path = self.layout.path_for(&file.name, Utc::now());
        info!(
            file = %file.name,
            fingerprint = %fingerprint,
            path = %storage_path,
            contract = self.ledger.address(),
            "submitting attestation"
        );

        let receipt = match self.write_and_confirm(&identity, &fingerprint, &storage_path).await {
            Ok(receipt) => receipt,
            Err(e) => {
                return Err(pipeline.fail_if_current(generation, WorkflowError::LedgerCall(e.to_string())));
            }
        };

        // STEP 3: Record the confirmation
        let certification = Certification {
            fingerprint: fingerprint.clone(),
            storage_path: storage_path.clone(),
            receipt: receipt.clone(),
        };
        {
            let mut st = pipeline.state();
            if pipeline.current_generation() == generation {
                st.file = None;
                st.stage = Stage::Confirmed(certification.clone());
                st.status = Some(Status::success(format!(
                    "Document certified on the ledger. Hash: {}... Path: {} | TX: {}...",
                    fingerprint.short(),
                    storage_path,
                    receipt.tx_hash.short()
                )));
            } else {
                debug!(tx = %receipt.tx_hash, "selection changed while submitting, keeping newer state");
            }
        }

        info!(tx = %receipt.tx_hash, block = receipt.block_number, "attestation confirmed");
        pipeline.telemetry().publish(SessionEvent::DocumentCertified {
            file_hash: fingerprint.to_string(),
            storage_path: storage_path.to_string(),
            tx_hash: receipt.tx_hash.to_string(),
            timestamp: now_rfc3339(),
        });

        Ok(certification)
    }

    async fn write_and_confirm(&self, from: &Identity, fingerprint: &Fingerprint, path: &StoragePath) -> Result<Receipt, LedgerError> {
        let tx = self.ledger.set_document(from, fingerprint.as_str(), path.as_str()).await?;
        debug!(tx = %tx, "attestation broadcast, waiting for confirmation");
        self.ledger.wait_for_confirmation(&tx).await
    }
}
