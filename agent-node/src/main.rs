//! Validator Agent Node Main Program
//!
//! Thin CLI over the agent library:
//! 1. `import`  - encrypt a private key into the keystore
//! 2. `list`    - enumerate keystore wallets
//! 3. `sign`    - sign a JSON payload with a keystore wallet
//! 4. `verify`  - verify a signed message envelope
//! 5. `probe`   - run an HTTP health probe against a URL

mod config;
mod error;
mod keystore;
mod monitor;
mod signer;
mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::keystore::KeystoreManager;
use crate::monitor::ProbeDispatcher;
use crate::signer::MessageSigner;
use crate::types::{AgentConfig, MonitoringRequest, SignedMessage};

/// Validator Agent Node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a private key into the encrypted keystore
    Import {
        /// Hex private key (with or without 0x prefix)
        #[arg(long)]
        private_key: String,

        /// Encryption password (min 8 characters)
        #[arg(long)]
        password: String,

        /// Wallet name (defaults to a timestamp-based file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// List wallets in the keystore directory
    List,

    /// Sign a JSON payload with a keystore wallet
    Sign {
        /// Keystore file path
        #[arg(long)]
        wallet: PathBuf,

        /// Decryption password
        #[arg(long)]
        password: String,

        /// JSON payload to sign
        #[arg(long)]
        payload: String,
    },

    /// Verify a signed message envelope (JSON, as produced by `sign`)
    Verify {
        /// Signed message JSON (inline or @file)
        #[arg(long)]
        message: String,
    },

    /// Run a single HTTP health probe
    Probe {
        /// Target URL
        #[arg(long)]
        url: String,

        /// Correlation token echoed back in the result
        #[arg(long, default_value = "cli-probe")]
        callback_id: String,

        /// Per-request timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("🚀 Starting validator agent v{}", env!("CARGO_PKG_VERSION"));

    let config = load_configuration(&args.config)?;

    match args.command {
        Command::Import {
            private_key,
            password,
            name,
        } => run_import(&config, &private_key, &password, name.as_deref()),
        Command::List => run_list(&config),
        Command::Sign {
            wallet,
            password,
            payload,
        } => run_sign(&config, &wallet, &password, &payload),
        Command::Verify { message } => run_verify(&message),
        Command::Probe {
            url,
            callback_id,
            timeout_ms,
        } => run_probe(&config, url, callback_id, timeout_ms).await,
    }
}

/// Initialize logging system
fn init_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("⚠️  Unknown log level: {}, using INFO", log_level);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

/// Load configuration file, falling back to defaults when absent
fn load_configuration(config_path: &Path) -> Result<AgentConfig> {
    if !config_path.exists() {
        warn!("Configuration file does not exist, using defaults");
        return Ok(AgentConfig::default());
    }

    info!("📋 Loading configuration: {}", config_path.display());
    config::load_config(config_path).context("Failed to load configuration")
}

fn run_import(
    config: &AgentConfig,
    private_key: &str,
    password: &str,
    name: Option<&str>,
) -> Result<()> {
    let manager = KeystoreManager::new(&config.keystore_dir);
    let imported = manager
        .import_wallet(private_key, password, name)
        .context("Failed to import wallet")?;

    info!("✅ Wallet imported");
    println!("address:  {}", imported.address);
    println!("keystore: {}", imported.keystore_path.display());
    Ok(())
}

fn run_list(config: &AgentConfig) -> Result<()> {
    let manager = KeystoreManager::new(&config.keystore_dir);
    let wallets = manager.list_wallets().context("Failed to list wallets")?;

    if wallets.is_empty() {
        println!("No wallets in {}", config.keystore_dir);
        return Ok(());
    }

    for wallet in wallets {
        println!("{}  {}  {}", wallet.name, wallet.address, wallet.path);
    }
    Ok(())
}

fn run_sign(config: &AgentConfig, wallet: &Path, password: &str, payload: &str) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("Payload is not valid JSON")?;

    let signer = MessageSigner::new(KeystoreManager::new(&config.keystore_dir));
    let signed = signer
        .sign_message_with_password(&payload, wallet, password)
        .context("Failed to sign payload")?;

    println!("{}", serde_json::to_string_pretty(&signed)?);
    Ok(())
}

fn run_verify(message: &str) -> Result<()> {
    let raw = match message.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read message file: {}", path))?,
        None => message.to_string(),
    };

    let signed: SignedMessage =
        serde_json::from_str(&raw).context("Message is not a valid signed envelope")?;

    let valid = MessageSigner::verify_signature(&signed);
    let fresh = signed.is_fresh();

    println!("signature: {}", if valid { "VALID" } else { "INVALID" });
    println!("freshness: {}", if fresh { "FRESH" } else { "STALE" });

    if !valid {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_probe(
    config: &AgentConfig,
    url: String,
    callback_id: String,
    timeout_ms: Option<u64>,
) -> Result<()> {
    let (dispatcher, _results) = ProbeDispatcher::new(config)?;

    let mut request = MonitoringRequest::new(url, callback_id);
    request.timeout_ms = timeout_ms;

    let result = dispatcher.monitor_website(request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
