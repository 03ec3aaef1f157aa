#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::Notify;

use notary_engine::clipboard::{Clipboard, MemoryClipboard};
use notary_engine::error::LedgerError;
use notary_engine::ledger::{LedgerContract, SimulatedLedger};
use notary_engine::telemetry::TelemetryListener;
use notary_engine::types::{Receipt, TxHash};
use notary_engine::wallet::{SimulatedWallet, WalletProvider};
use notary_engine::{Collaborators, DocumentId, EngineConfig, Identity, Surface};

pub const REQUIRED: &str = "0xB7393AD6D79663D4d56aE0988cEe1d94e72F5608";
pub const OTHER: &str = "0x1111111111111111111111111111111111111111";
pub const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

pub fn identity(raw: &str) -> Identity {
    Identity::parse(raw).unwrap()
}

/// Ledger wrapper counting calls; reads can be held until released.
pub struct CountingLedger {
    pub inner: SimulatedLedger,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub hold_reads: AtomicBool,
    pub release: Notify,
}

impl CountingLedger {
    pub fn new() -> Self {
        CountingLedger {
            inner: SimulatedLedger::new(notary_engine::config::DEFAULT_CONTRACT_ADDRESS),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            hold_reads: AtomicBool::new(false),
            release: Notify::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerContract for CountingLedger {
    fn address(&self) -> &str {
        self.inner.address()
    }

    async fn set_document(&self, from: &Identity, fingerprint_hex: &str, storage_path: &str) -> Result<TxHash, LedgerError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_document(from, fingerprint_hex, storage_path).await
    }

    async fn wait_for_confirmation(&self, tx: &TxHash) -> Result<Receipt, LedgerError> {
        self.inner.wait_for_confirmation(tx).await
    }

    async fn get_document_hash(&self, id: DocumentId) -> Result<String, LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.hold_reads.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        self.inner.get_document_hash(id).await
    }
}

pub struct Harness {
    pub surface: Surface,
    pub wallet: Arc<SimulatedWallet>,
    pub ledger: Arc<CountingLedger>,
    pub clipboard: Arc<MemoryClipboard>,
    pub listener: Option<TelemetryListener>,
}

impl Harness {
    /// Every telemetry message buffered so far, parsed.
    pub fn drain_events(&mut self) -> Vec<serde_json::Value> {
        let mut events = Vec::new();
        if let Some(listener) = self.listener.as_mut() {
            while let Some(message) = listener.try_next() {
                events.push(serde_json::from_str(&message).unwrap());
            }
        }
        events
    }
}

/// Surface with default config, wallet active on `active`.
pub fn harness(active: &str) -> Harness {
    harness_with(EngineConfig::default(), active)
}

pub fn harness_with(config: EngineConfig, active: &str) -> Harness {
    let wallet = Arc::new(SimulatedWallet::new(vec![identity(active)], 10 * ONE_ETHER));
    let ledger = Arc::new(CountingLedger::new());
    let clipboard = Arc::new(MemoryClipboard::new());

    let provider: Arc<dyn WalletProvider> = wallet.clone();
    let contract: Arc<dyn LedgerContract> = ledger.clone();
    let copy_target: Arc<dyn Clipboard> = clipboard.clone();

    let (surface, listener) = Surface::open(
        config,
        Collaborators {
            provider: Some(provider),
            ledger: contract,
            clipboard: Some(copy_target),
        },
    );

    Harness { surface, wallet, ledger, clipboard, listener }
}

/// Reader that records whether it was ever polled.
pub struct Tripwire(pub Arc<AtomicBool>);

impl AsyncRead for Tripwire {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        self.0.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}
