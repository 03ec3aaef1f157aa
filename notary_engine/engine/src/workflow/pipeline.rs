use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::clipboard::Clipboard;
use crate::error::WorkflowError;
use crate::fingerprint::{FileHandle, FileInfo, check_size, digest_stream, format_file_size};
use crate::identity::{IdentityBinding, IdentityPolicy};
use crate::telemetry::{SessionEvent, TelemetryChannel, now_rfc3339};
use crate::types::{Fingerprint, Identity};
use crate::wallet::WalletProvider;
use crate::workflow::{Stage, Status, WorkflowSnapshot};

/// Collaborators a workflow is built from.
pub(crate) struct PipelineDeps {
    pub provider: Option<Arc<dyn WalletProvider>>,
    pub identity: Arc<IdentityBinding>,
    pub telemetry: Arc<TelemetryChannel>,
    pub clipboard: Option<Arc<dyn Clipboard>>,
    pub max_file_size: u64,
}

/// Mutable state of one workflow instance
#[derive(Debug, Default)]
pub(crate) struct PipelineState {
    pub stage: Stage,
    pub status: Option<Status>,
    pub file: Option<FileInfo>,              // selected file, released after a confirmed submission
    pub fingerprint: Option<Fingerprint>,    // fingerprint of `file`
    pub ledger_fingerprint: Option<String>,  // last value fetched from the ledger
    pub connected: bool,                     // connect() succeeded under this workflow's policy
    pub exchanging: bool,                    // a ledger exchange is in flight
}

impl PipelineState {
    /// Stage implied by the data held, used when a transient stage ends.
    fn settled_stage(&self) -> Stage {
        if self.fingerprint.is_some() {
            Stage::HashReady
        } else if self.file.is_some() {
            Stage::FileSelected
        } else {
            Stage::Idle
        }
    }
}

/// Stages shared by attestation and verification: provider guard, identity
/// binding, file selection and fingerprinting.
pub(crate) struct Pipeline {
    kind: &'static str,
    provider: Option<Arc<dyn WalletProvider>>,
    identity: Arc<IdentityBinding>,
    policy: IdentityPolicy,
    telemetry: Arc<TelemetryChannel>,
    clipboard: Option<Arc<dyn Clipboard>>,
    max_file_size: u64,
    generation: AtomicU64, // bumped by every selection and clear
    state: Mutex<PipelineState>,
}

impl Pipeline {
    pub(crate) fn new(kind: &'static str, policy: IdentityPolicy, deps: PipelineDeps) -> Self {
        Pipeline {
            kind,
            provider: deps.provider,
            identity: deps.identity,
            policy,
            telemetry: deps.telemetry,
            clipboard: deps.clipboard,
            max_file_size: deps.max_file_size,
            generation: AtomicU64::new(0),
            state: Mutex::new(PipelineState::default()),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn telemetry(&self) -> &TelemetryChannel {
        &self.telemetry
    }

    pub(crate) fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Provider guard, checked before anything else by every stage.
    pub(crate) fn provider(&self) -> Result<&Arc<dyn WalletProvider>, WorkflowError> {
        match &self.provider {
            Some(provider) => Ok(provider),
            None => Err(self.fail(WorkflowError::ProviderAbsent)),
        }
    }

    /// Record `err` as the terminal status of the current attempt.
    pub(crate) fn fail(&self, err: WorkflowError) -> WorkflowError {
        {
            let mut st = self.state();
            st.stage = Stage::Failed(err.clone());
            st.status = Some(Status::error(&err));
        }
        warn!(workflow = self.kind, error = %err, "stage failed");
        err
    }

    /// Like [`fail`](Self::fail), unless a newer selection owns the state by now.
    pub(crate) fn fail_if_current(&self, generation: u64, err: WorkflowError) -> WorkflowError {
        if self.current_generation() == generation {
            self.fail(err)
        } else {
            warn!(workflow = self.kind, error = %err, "exchange for a superseded selection failed");
            err
        }
    }

    /// Bound identity, provided `connect` succeeded and the policy still holds.
    pub(crate) fn bound_identity(&self, st: &PipelineState) -> Result<Identity, WorkflowError> {
        if !st.connected {
            return Err(WorkflowError::NotConnected);
        }
        let identity = self.identity.current().ok_or(WorkflowError::NotConnected)?;
        self.policy.check(&identity)?;
        Ok(identity)
    }

    /// File, identity and fingerprint required by an exchange, checked in that order.
    pub(crate) fn exchange_inputs(&self, st: &PipelineState) -> Result<(FileInfo, Identity, Fingerprint), WorkflowError> {
        let file = st.file.clone().ok_or(WorkflowError::NoFileSelected)?;
        let identity = self.bound_identity(st)?;
        let fingerprint = st.fingerprint.clone().ok_or(WorkflowError::FingerprintUnavailable)?;
        Ok((file, identity, fingerprint))
    }

    pub(crate) async fn connect(&self) -> Result<Identity, WorkflowError> {
        let provider = Arc::clone(self.provider()?);

        {
            let mut st = self.state();
            if !matches!(st.stage, Stage::Hashing) && !st.exchanging {
                st.stage = Stage::Connecting;
            }
            st.status = Some(Status::info("Connecting wallet..."));
        }

        let identity = match self.identity.request_connection(provider.as_ref()).await {
            Ok(identity) => identity,
            Err(err) => {
                self.state().connected = false;
                return Err(self.fail(err));
            }
        };

        if let Err(err) = self.policy.check(&identity) {
            self.state().connected = false;
            return Err(self.fail(err));
        }

        {
            let mut st = self.state();
            st.connected = true;
            if matches!(st.stage, Stage::Connecting) {
                st.stage = st.settled_stage();
            }
            st.status = Some(Status::success(format!("Wallet connected: {}", identity.short())));
        }

        info!(workflow = self.kind, identity = %identity, "identity bound");
        self.telemetry.publish(SessionEvent::WalletConnected {
            address: identity.to_string(),
            timestamp: now_rfc3339(),
        });
        Ok(identity)
    }

    /// Select a file and fingerprint it. A later selection (or `clear`)
    /// supersedes this one: hashing stops early and nothing stale is stored.
    pub(crate) async fn select_file(&self, handle: FileHandle) -> Result<Fingerprint, WorkflowError> {
        self.provider()?;
        let (info, reader) = handle.into_parts();

        let generation = {
            let mut st = self.state();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            st.fingerprint = None;
            st.ledger_fingerprint = None;

            if let Err(err) = check_size(&info, self.max_file_size) {
                st.file = None;
                st.stage = Stage::Failed(err.clone());
                st.status = Some(Status::error(&err));
                warn!(workflow = self.kind, file = %info.name, size = info.size, "file rejected before hashing");
                return Err(err);
            }

            st.stage = Stage::Hashing;
            st.status = Some(Status::info(format!(
                "Computing hash of {} ({})",
                info.name,
                format_file_size(info.size)
            )));
            st.file = Some(info.clone());
            generation
        };

        debug!(workflow = self.kind, file = %info.name, generation, "fingerprint computation started");
        let result = digest_stream(reader, self.max_file_size, || self.current_generation() != generation).await;

        let mut st = self.state();
        if self.current_generation() != generation {
            debug!(workflow = self.kind, file = %info.name, "discarding superseded fingerprint");
            return Err(WorkflowError::Superseded);
        }

        match result {
            Ok(fingerprint) => {
                st.fingerprint = Some(fingerprint.clone());
                // A failure recorded while hashing (a rejected connect) keeps its status
                if !matches!(st.stage, Stage::Failed(_)) {
                    st.stage = Stage::HashReady;
                    st.status = Some(Status::success("File hash computed"));
                }
                drop(st);

                info!(workflow = self.kind, file = %info.name, fingerprint = %fingerprint, "fingerprint computed");
                self.telemetry.publish(SessionEvent::FileHashCalculated {
                    file_name: info.name,
                    file_hash: fingerprint.to_string(),
                    timestamp: now_rfc3339(),
                });
                Ok(fingerprint)
            }
            Err(err) => {
                if matches!(err, WorkflowError::FileTooLarge { .. }) {
                    st.file = None;
                }
                st.stage = Stage::Failed(err.clone());
                st.status = Some(Status::error(&err));
                warn!(workflow = self.kind, error = %err, "fingerprint computation failed");
                Err(err)
            }
        }
    }

    /// Drop the selected file and everything derived from it.
    pub(crate) fn clear(&self) {
        let mut st = self.state();
        self.generation.fetch_add(1, Ordering::SeqCst);
        st.file = None;
        st.fingerprint = None;
        st.ledger_fingerprint = None;
        st.stage = Stage::Idle;
        st.status = None;
        debug!(workflow = self.kind, "selection cleared");
    }

    /// Copy `text` to the clipboard. Only the status line changes.
    pub(crate) async fn copy_text(&self, text: Option<String>, what: &str) -> Result<(), WorkflowError> {
        let text = text.ok_or(WorkflowError::FingerprintUnavailable)?;

        let result = match &self.clipboard {
            Some(clipboard) => clipboard.write_text(&text).await.map_err(WorkflowError::Clipboard),
            None => Err(WorkflowError::Clipboard("no clipboard available".to_string())),
        };

        let mut st = self.state();
        match &result {
            Ok(()) => st.status = Some(Status::success(format!("{what} copied to clipboard"))),
            Err(err) => st.status = Some(Status::error(err)),
        }
        result
    }

    pub(crate) fn snapshot(&self) -> WorkflowSnapshot {
        let st = self.state();
        WorkflowSnapshot {
            stage: st.stage.clone(),
            status: st.status.clone(),
            file: st.file.clone(),
            fingerprint: st.fingerprint.clone(),
            identity: self.bound_identity(&st).ok(),
            ledger_fingerprint: st.ledger_fingerprint.clone(),
        }
    }
}

/// Claim on the single in-flight exchange of a pipeline; released on drop.
pub(crate) struct ExchangeSlot<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> ExchangeSlot<'a> {
    /// The caller must already have set `exchanging` under the state lock.
    pub(crate) fn claimed(pipeline: &'a Pipeline) -> Self {
        ExchangeSlot { pipeline }
    }
}

impl Drop for ExchangeSlot<'_> {
    fn drop(&mut self) {
        let mut st = self.pipeline.state();
        st.exchanging = false;

        // Still in a transient exchange stage: the caller dropped the future
        if matches!(st.stage, Stage::Submitting | Stage::Fetching) {
            st.stage = st.settled_stage();
            st.status = Some(Status::warning("Ledger exchange cancelled"));
            debug!(workflow = self.pipeline.kind, "exchange abandoned before completion");
        }
    }
}
