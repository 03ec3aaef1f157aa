//! Notary Engine Core Library
//!
//! Fingerprints documents with SHA-256, binds them to a wallet identity and
//! records or checks the fingerprint against a document registry on a ledger.

pub mod clipboard;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod surface;
pub mod telemetry;
pub mod types;
pub mod wallet;
pub mod workflow;

pub use config::EngineConfig;
pub use error::WorkflowError;
pub use fingerprint::{FileHandle, compute_fingerprint};
pub use surface::{Collaborators, Surface};
pub use types::{DocumentId, Fingerprint, Identity};
pub use workflow::{AttestationWorkflow, Stage, VerificationWorkflow, Verdict};
