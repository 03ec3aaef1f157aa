use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::WorkflowError;
use crate::fingerprint::FileHandle;
use crate::identity::IdentityPolicy;
use crate::ledger::LedgerContract;
use crate::telemetry::{SessionEvent, now_rfc3339};
use crate::types::{DocumentId, Fingerprint, Identity};
use crate::workflow::pipeline::{ExchangeSlot, Pipeline, PipelineDeps};
use crate::workflow::{Comparison, Stage, Status, Verdict, WorkflowSnapshot};

/// Compares a document against the fingerprint stored under a document id.
///
/// Clones share one state.
#[derive(Clone)]
pub struct VerificationWorkflow {
    pipeline: Arc<Pipeline>,
    ledger: Arc<dyn LedgerContract>,
}

impl VerificationWorkflow {
    pub(crate) fn new(deps: PipelineDeps, policy: IdentityPolicy, ledger: Arc<dyn LedgerContract>) -> Self {
        VerificationWorkflow {
            pipeline: Arc::new(Pipeline::new("verification", policy, deps)),
            ledger,
        }
    }

    /// Bind the provider's active identity; fails with `WrongIdentity`
    /// when a required identity is configured and differs.
    pub async fn connect(&self) -> Result<Identity, WorkflowError> {
        self.pipeline.connect().await
    }

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

    /// Copy the fingerprint last fetched from the ledger.
    pub async fn copy_ledger_fingerprint(&self) -> Result<(), WorkflowError> {
        let stored = self.pipeline.state().ledger_fingerprint.clone();
        self.pipeline.copy_text(stored, "Ledger hash").await
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.pipeline.snapshot()
    }

    pub fn stage(&self) -> Stage {
        self.pipeline.state().stage.clone()
    }

    /// Fetch the fingerprint stored under `document_id` and compare it with
    /// the selected file's. A mismatch is a successful outcome.
    pub async fn verify(&self, document_id: &str) -> Result<Comparison, WorkflowError> {
        let pipeline = self.pipeline.as_ref();
        pipeline.provider()?;

        // STEP 1: Check preconditions (file, id, identity, fingerprint) and claim the exchange
        let (id, fingerprint, generation) = {
            let mut st = pipeline.state();
            if st.exchanging {
                return Err(WorkflowError::ExchangeInProgress);
            }
            let checked = st
                .file
                .as_ref()
                .ok_or(WorkflowError::NoFileSelected)
                .and_then(|_| DocumentId::parse(document_id))
                .and_then(|id| pipeline.exchange_inputs(&st).map(|(_, _, fingerprint)| (id, fingerprint)));
            let (id, fingerprint) = match checked {
                Ok(checked) => checked,
                Err(err) => {
                    drop(st);
                    return Err(pipeline.fail(err));
                }
            };
            st.exchanging = true;
            st.ledger_fingerprint = None;
            st.stage = Stage::Fetching;
            st.status = Some(Status::info(format!("Fetching fingerprint of document {id}...")));
            (id, fingerprint, pipeline.current_generation())
        };
        let _slot = ExchangeSlot::claimed(pipeline);

        // STEP 2: Read the stored fingerprint
        debug!(document = %id, contract = self.ledger.address(), "fetching stored fingerprint");
        let stored = match self.ledger.get_document_hash(id).await {
            Ok(stored) => stored.trim().to_string(),
            Err(e) => {
                return Err(pipeline.fail_if_current(generation, WorkflowError::LedgerCall(e.to_string())));
            }
        };

        // STEP 3: Re-validate both sides and compare
        let comparison = {
            let mut st = pipeline.state();
            if pipeline.current_generation() != generation || st.fingerprint.as_ref() != Some(&fingerprint) {
                debug!(document = %id, "selection changed while fetching, comparison dropped");
                return Err(WorkflowError::Superseded);
            }

            if stored.is_empty() {
                let err = WorkflowError::LedgerCall(format!("no fingerprint stored under document {id}"));
                drop(st);
                return Err(pipeline.fail(err));
            }

            let verdict = if fingerprint.matches(&stored) { Verdict::Match } else { Verdict::Mismatch };
            let comparison = Comparison {
                document_id: id,
                local: fingerprint.clone(),
                ledger: stored.clone(),
                verdict,
            };

            st.ledger_fingerprint = Some(stored.clone());
            st.stage = Stage::Compared(comparison.clone());
            st.status = Some(match verdict {
                Verdict::Match => Status::success("Document is authentic: the fingerprints match"),
                Verdict::Mismatch => Status::warning("ALERT: document altered, the fingerprints differ"),
            });
            comparison
        };

        let event = match comparison.verdict {
            Verdict::Match => {
                info!(document = %id, fingerprint = %fingerprint, "document verified");
                SessionEvent::ValidationSuccess {
                    document_id: id.to_string(),
                    file_hash: fingerprint.to_string(),
                    blockchain_hash: stored,
                    timestamp: now_rfc3339(),
                }
            }
            Verdict::Mismatch => {
                warn!(document = %id, local = %fingerprint, ledger = %stored, "document does not match its attestation");
                SessionEvent::ValidationFailed {
                    document_id: id.to_string(),
                    file_hash: fingerprint.to_string(),
                    blockchain_hash: stored,
                    timestamp: now_rfc3339(),
                }
            }
        };
        pipeline.telemetry().publish(event);

        Ok(comparison)
    }
}
