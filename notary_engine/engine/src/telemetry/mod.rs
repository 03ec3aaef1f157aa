//! Best-effort session notifications for an external real-time listener.
//!
//! Delivery is fire-and-forget: a closed channel, a full buffer or a vanished
//! listener drops the message. Nothing here can fail a workflow.

use std::sync::Mutex;

use chrono::SecondsFormat;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Type of workflow event being published
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    WalletConnected { address: String, timestamp: String },
    #[serde(rename_all = "camelCase")]
    FileHashCalculated {
        file_name: String,
        file_hash: String,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    DocumentCertified {
        file_hash: String,
        storage_path: String,
        tx_hash: String,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    ValidationSuccess {
        document_id: String,
        file_hash: String,
        blockchain_hash: String,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    ValidationFailed {
        document_id: String,
        file_hash: String,
        blockchain_hash: String,
        timestamp: String,
    },
}

impl SessionEvent {
    pub fn label(&self) -> &'static str {
        match self {
            SessionEvent::WalletConnected { .. } => "wallet_connected",
            SessionEvent::FileHashCalculated { .. } => "file_hash_calculated",
            SessionEvent::DocumentCertified { .. } => "document_certified",
            SessionEvent::ValidationSuccess { .. } => "validation_success",
            SessionEvent::ValidationFailed { .. } => "validation_failed",
        }
    }
}

/// Helper to get current timestamp as RFC3339 string (UTC, milliseconds)
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Sending half of the notification channel.
pub struct TelemetryChannel {
    sender: Mutex<Option<mpsc::Sender<String>>>,
}

/// Receiving half, handed to whoever forwards messages to the listener.
pub struct TelemetryListener {
    receiver: mpsc::Receiver<String>,
}

impl TelemetryChannel {
    /// Open a channel buffering up to `buffer` messages.
    pub fn open(buffer: usize) -> (Self, TelemetryListener) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        debug!(buffer, "telemetry channel opened");
        (
            TelemetryChannel { sender: Mutex::new(Some(tx)) },
            TelemetryListener { receiver: rx },
        )
    }

    /// A channel that was never opened; every publish is dropped.
    pub fn disabled() -> Self {
        TelemetryChannel { sender: Mutex::new(None) }
    }

    pub fn is_open(&self) -> bool {
        self.sender
            .lock()
            .map(|s| s.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }

    /// Publish `event` if the channel is open; otherwise drop it.
    pub fn publish(&self, event: SessionEvent) {
        let Ok(guard) = self.sender.lock() else {
            return;
        };
        let Some(tx) = guard.as_ref() else {
            trace!(event = event.label(), "telemetry closed, event dropped");
            return;
        };

        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "telemetry serialization failed");
                return;
            }
        };

        if let Err(e) = tx.try_send(payload) {
            debug!(event = event.label(), error = %e, "telemetry event dropped");
        }
    }

    /// Close the channel. Later publishes are dropped; the listener drains what is buffered.
    pub fn close(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            if guard.take().is_some() {
                debug!("telemetry channel closed");
            }
        }
    }
}

impl TelemetryListener {
    /// Next message, or `None` once the channel is closed and drained.
    pub async fn next(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`next`](Self::next).
    pub fn try_next(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }
}
