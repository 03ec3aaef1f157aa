//! Attestation and verification workflows.
//!
//! Both run the same pipeline (file acquisition, fingerprint, identity
//! binding) and differ only in the final ledger exchange.

pub mod attestation;
pub(crate) mod pipeline;
pub mod verification;

use serde::Serialize;

use crate::error::WorkflowError;
use crate::fingerprint::FileInfo;
use crate::types::{DocumentId, Fingerprint, Identity, Receipt, StoragePath};

pub use attestation::AttestationWorkflow;
pub use verification::VerificationWorkflow;

/// Where a workflow currently is.
///
/// Forward order: `Idle -> Connecting -> FileSelected -> Hashing -> HashReady ->
/// Submitting | Fetching -> Confirmed | Compared`. Any stage may end in `Failed`;
/// a new file selection or `clear` starts over.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Idle,
    Connecting,
    FileSelected,
    Hashing,
    HashReady,
    Submitting,
    Fetching,
    Confirmed(Certification),
    Compared(Comparison),
    Failed(WorkflowError),
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Connecting => "connecting",
            Stage::FileSelected => "file-selected",
            Stage::Hashing => "hashing",
            Stage::HashReady => "hash-ready",
            Stage::Submitting => "submitting",
            Stage::Fetching => "fetching",
            Stage::Confirmed(_) => "confirmed",
            Stage::Compared(_) => "compared",
            Stage::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Confirmed(_) | Stage::Compared(_) | Stage::Failed(_))
    }
}

/// Category of a status line. Set by the code path that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusCategory {
    Info,
    Success,
    Warning,
    Error,
}

/// Operator-facing status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub category: StatusCategory,
    pub message: String,
}

impl Status {
    pub fn info(message: impl Into<String>) -> Self {
        Status { category: StatusCategory::Info, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Status { category: StatusCategory::Success, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Status { category: StatusCategory::Warning, message: message.into() }
    }

    pub fn error(err: &WorkflowError) -> Self {
        Status { category: StatusCategory::Error, message: err.to_string() }
    }
}

/// Confirmed attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certification {
    pub fingerprint: Fingerprint,
    pub storage_path: StoragePath,
    pub receipt: Receipt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Match,
    Mismatch,
}

/// Outcome of comparing a fresh fingerprint with the one on the ledger.
/// Both verdicts are successful outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub document_id: DocumentId,
    pub local: Fingerprint,
    pub ledger: String,
    pub verdict: Verdict,
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        self.verdict == Verdict::Match
    }
}

/// Point-in-time copy of a workflow's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub stage: Stage,
    pub status: Option<Status>,
    pub file: Option<FileInfo>,
    pub fingerprint: Option<Fingerprint>,
    pub identity: Option<Identity>, // bound identity that passes the workflow's policy
    pub ledger_fingerprint: Option<String>,
}
