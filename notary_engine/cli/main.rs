//! Notary CLI
//!
//! Runs the attestation and verification workflows against the simulated
//! wallet and a JSON-file-backed ledger.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use notary_engine::clipboard::MemoryClipboard;
use notary_engine::fingerprint::format_file_size;
use notary_engine::ledger::SimulatedLedger;
use notary_engine::logging::init_logging;
use notary_engine::wallet::{SimulatedWallet, WalletProvider};
use notary_engine::wallet::units::WEI_PER_ETHER;
use notary_engine::{Collaborators, EngineConfig, FileHandle, Identity, Surface, Verdict, compute_fingerprint};

#[derive(Parser)]
#[command(name = "notary", version = "0.1", about = "Document fingerprint and attestation CLI")]
struct Cli {
    #[arg(long, help = "JSON config file (NOTARY_* variables override it)")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "ledger.json", help = "File backing the simulated ledger")]
    ledger: PathBuf,

    #[arg(long, help = "Wallet account to act as (defaults to the required identity)")]
    account: Option<String>,

    #[arg(long, help = "Run without a wallet provider")]
    no_wallet: bool,

    #[arg(long, help = "Write JSON log lines")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SHA-256 fingerprint of a file
    Hash { file: PathBuf },

    #[command(flatten)]
    Session(SessionCommand),
}

/// Commands that run inside a wallet and ledger session.
#[derive(Subcommand)]
enum SessionCommand {
    /// Record a file's fingerprint on the ledger
    Certify { file: PathBuf },

    /// Compare a file with the fingerprint stored under a document id
    Verify {
        file: PathBuf,

        #[arg(short, long)]
        document_id: String,
    },

    /// Show the active account and its balance
    Balance,

    /// Send ether from the active account
    Transfer {
        #[arg(short, long)]
        to: String,

        #[arg(short, long, help = "Amount in ether, e.g. 0.0012")]
        amount: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Config file first, then NOTARY_* overrides, then flags
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    }
    .apply_env()?;
    if cli.json_logs {
        config.log_json = true;
    }

    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = init_logging(&config.log_dir, config.log_json);

    match cli.command {
        // Hashing needs no wallet or ledger
        Commands::Hash { file } => {
            let handle = FileHandle::open(&file).await.with_context(|| format!("opening {}", file.display()))?;
            let size = handle.size();
            let fingerprint = compute_fingerprint(handle, config.max_file_size).await?;
            println!("{}  {} ({})", fingerprint, file.display(), format_file_size(size));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Session(command) => {
            let account = if cli.no_wallet { None } else { Some(wallet_account(cli.account.as_deref(), &config)?) };
            let surface = open_surface(account, &cli.ledger, config)?;
            let code = run(&surface, command).await;
            surface.close();
            code
        }
    }
}

/// Account the simulated wallet starts with.
fn wallet_account(flag: Option<&str>, config: &EngineConfig) -> Result<Identity> {
    match (flag, &config.required_identity) {
        (Some(raw), _) => Ok(Identity::parse(raw)?),
        (None, Some(required)) => Ok(required.clone()),
        (None, None) => anyhow::bail!("--account is required when no identity is configured"),
    }
}

fn open_surface(account: Option<Identity>, ledger_path: &Path, config: EngineConfig) -> Result<Surface> {
    let provider = account.map(|account| {
        let wallet: Arc<dyn WalletProvider> = Arc::new(SimulatedWallet::new(vec![account], 10 * WEI_PER_ETHER));
        wallet
    });

    let ledger = SimulatedLedger::open(config.contract_address.clone(), ledger_path)
        .with_context(|| format!("opening ledger {}", ledger_path.display()))?;

    let collaborators = Collaborators {
        provider,
        ledger: Arc::new(ledger),
        clipboard: Some(Arc::new(MemoryClipboard::new())),
    };

    let (surface, listener) = Surface::open(config, collaborators);
    info!(session = %surface.session_id(), "session started");

    // Forward session notifications to the log
    if let Some(mut listener) = listener {
        tokio::spawn(async move {
            while let Some(message) = listener.next().await {
                info!(target: "notary::telemetry", %message, "session event");
            }
        });
    }

    Ok(surface)
}

async fn run(surface: &Surface, command: SessionCommand) -> Result<ExitCode> {
    match command {
        // Subcommand: Certify
        // connect -> select -> submit, printing the assigned document id
        SessionCommand::Certify { file } => {
            let workflow = surface.attestation();
            let identity = workflow.connect().await?;
            println!("Connected as {}", identity.short());

            let handle = FileHandle::open(&file).await.with_context(|| format!("opening {}", file.display()))?;
            let fingerprint = workflow.select_file(handle).await?;
            println!("Fingerprint: {fingerprint}");

            let certification = workflow.submit().await?;
            println!("Stage: {}", workflow.stage().label());
            println!("Storage path: {}", certification.storage_path);
            println!("Transaction: {}", certification.receipt.tx_hash);
            match certification.receipt.document_id {
                Some(id) => println!("Document id: {id}"),
                None => println!("Document id: not reported by the contract"),
            }
            Ok(ExitCode::SUCCESS)
        }

        // Subcommand: Verify
        // Exit status 2 when the document differs from its attestation
        SessionCommand::Verify { file, document_id } => {
            let workflow = surface.verification();
            workflow.connect().await?;

            let handle = FileHandle::open(&file).await.with_context(|| format!("opening {}", file.display()))?;
            workflow.select_file(handle).await?;

            let comparison = workflow.verify(&document_id).await?;
            println!("Stage: {}", workflow.stage().label());
            println!("Local:  {}", comparison.local);
            println!("Ledger: {}", comparison.ledger);
            match comparison.verdict {
                Verdict::Match => {
                    println!("Document {} is authentic", comparison.document_id);
                    Ok(ExitCode::SUCCESS)
                }
                Verdict::Mismatch => {
                    println!("ALERT: document {} was altered", comparison.document_id);
                    Ok(ExitCode::from(2))
                }
            }
        }

        SessionCommand::Balance => {
            surface.connect().await?;
            let overview = surface.account_overview().await?;
            println!("Account: {}", overview.identity);
            println!("Balance: {} ETH", overview.balance);
            Ok(ExitCode::SUCCESS)
        }

        SessionCommand::Transfer { to, amount } => {
            surface.connect().await?;
            let tx = surface.transfer(&to, &amount).await?;
            println!("Transfer sent: {tx}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

// cargo run -p notary-cli -- certify contract.pdf --ledger ledger.json
// cargo run -p notary-cli -- verify contract.pdf --document-id 1
