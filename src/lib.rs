//! Seedkeeper - Stellar Testnet Keypair auf dem Gerät
//!
//! Ein einzelnes Ed25519 Schlüsselpaar als Stellar Identität:
//! - Erzeugung aus dem OS-CSPRNG
//! - Ablage des Secret Seeds im Credential Store des Betriebssystems
//! - Ersetzen nur nach ausdrücklicher Bestätigung
//! - Friendbot Funding und Block-Explorer Link für das Testnet

pub mod config;
pub mod crypto;
pub mod custody;
pub mod lifecycle;
pub mod network;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::{AppConfig, StoreBackend, StoreConfig};
use custody::{FileStore, KeyringStore, SecretStore, StoreError};
use lifecycle::{KeypairController, LifecycleError, RegenerateOutcome, StartupOutcome};
use network::{explorer_url, FundingClient, FundingOutcome};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "seedkeeper", version, about = "Stellar testnet keypair on this device")]
pub struct Cli {
    /// Pfad zur Konfigurationsdatei
    #[arg(long, env = "SEEDKEEPER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Zeigt die Account ID (und auf Wunsch den Secret Seed)
    Show {
        /// Secret Seed ebenfalls ausgeben
        #[arg(long)]
        reveal: bool,
    },
    /// Erzeugt ein neues Schlüsselpaar und ersetzt das vorhandene
    New {
        /// Bestätigung überspringen
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Fordert Testnet-Lumen beim Friendbot an
    Fund,
    /// Gibt die Block-Explorer URL des Accounts aus
    Explorer,
}

// ============================================================================
// SETUP
// ============================================================================

/// Initialisiert Logging (stderr, `RUST_LOG` hat Vorrang)
pub fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Öffnet das konfigurierte Secret-Backend
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn SecretStore>, StoreError> {
    match config.backend {
        StoreBackend::Keyring => {
            tracing::info!("Using OS keyring (service '{}')", config.service);
            Ok(Arc::new(KeyringStore::new(&config.service)?))
        }
        StoreBackend::File => {
            let store = match &config.path {
                Some(path) => FileStore::new(path),
                None => FileStore::in_app_data_dir()?,
            };
            tracing::info!("Using private key file at {:?}", store.path());
            Ok(Arc::new(store))
        }
    }
}

/// Ja/Nein-Abfrage auf dem Terminal
fn prompt_confirm(message: &str) -> bool {
    eprint!("{message} [y/N] ");
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Startet den Controller und meldet ein korruptes Secret ausdrücklich
fn start(controller: &KeypairController) -> anyhow::Result<()> {
    match controller.initialize() {
        Ok(_) => Ok(()),
        Err(LifecycleError::MalformedSecret(e)) => anyhow::bail!(
            "The stored secret is corrupt ({e}). Nothing was overwritten. \
             Run `seedkeeper new` to replace it with a new keypair."
        ),
        Err(LifecycleError::StorageUnavailable(e)) => {
            Err(e).context("Secure storage is unavailable, try again once it is unlocked")
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn show(controller: &KeypairController, reveal: bool) -> anyhow::Result<()> {
    start(controller)?;
    let keypair = controller
        .keypair()
        .context("Keypair not available after startup")?;

    if reveal {
        println!("Secret: {}", keypair.secret().as_str());
    }
    println!("Public Key: {}", keypair.public_key());
    Ok(())
}

fn regenerate(controller: &KeypairController) -> anyhow::Result<()> {
    // Ein korruptes Secret darf hier ersetzt werden
    match controller.load_or_create() {
        Ok(StartupOutcome::Created(keypair)) => {
            // Das erste Schlüsselpaar wurde eben erst erzeugt, nichts zu ersetzen
            println!("Public Key: {}", keypair.public_key());
            return Ok(());
        }
        Ok(StartupOutcome::Loaded(_)) | Err(LifecycleError::MalformedSecret(_)) => {}
        Err(e) => return Err(e.into()),
    }

    match controller.trigger_regenerate()? {
        RegenerateOutcome::Regenerated { public_key } => {
            println!("Public Key: {public_key}");
        }
        RegenerateOutcome::Declined => println!("Keeping the existing keypair."),
        RegenerateOutcome::NotInitialized => {
            anyhow::bail!("No keypair exists yet, run `seedkeeper show` first")
        }
    }
    Ok(())
}

async fn fund(controller: &KeypairController, config: &AppConfig) -> anyhow::Result<()> {
    start(controller)?;
    let public_key = controller
        .public_key()
        .context("Keypair not available after startup")?;

    let client = FundingClient::new(&config.network)?;
    match client.fund(&public_key).await? {
        FundingOutcome::Created { .. } => {
            println!("The account was created. You can view it in a block explorer:");
            println!("{}", explorer_url(&config.network.explorer_url, &public_key));
        }
        FundingOutcome::Rejected { detail, .. } => println!("{detail}"),
    }
    Ok(())
}

fn explorer(controller: &KeypairController, config: &AppConfig) -> anyhow::Result<()> {
    start(controller)?;
    let public_key = controller
        .public_key()
        .context("Keypair not available after startup")?;

    println!("{}", explorer_url(&config.network.explorer_url, &public_key));
    Ok(())
}

// ============================================================================
// APP RUNNER
// ============================================================================

/// Einstiegspunkt des Binaries
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config);

    let store = open_store(&config.store).context("Failed to open secure storage")?;

    let auto_confirm = matches!(cli.command, Some(Command::New { yes: true }));
    let controller = KeypairController::new(store, move |message: &str| {
        auto_confirm || prompt_confirm(message)
    });

    match cli.command.unwrap_or(Command::Show { reveal: false }) {
        Command::Show { reveal } => show(&controller, reveal),
        Command::New { .. } => regenerate(&controller),
        Command::Fund => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(fund(&controller, &config))
        }
        Command::Explorer => explorer(&controller, &config),
    }
}

// ============================================================================
// TESTS
// ============================================================================
