//!
//! Command-line front end for vault-keeper
//!
//! # Syntax:
//!
//! ```text
//!  # Encrypt a JSON file (or stdin) and save it as the current vault
//!  $ vault save [ FILE | - ]
//!
//!  # Decrypt the current vault
//!  $ vault load [ -o OUT ]
//!
//!  # List backups, and make one of them current
//!  $ vault backups
//!  $ vault restore backup_1740823200123
//!
//!  # Compare with the cloud copy, saving it locally if it wins
//!  $ vault --cloud sync --adopt
//! ```
//!
//! The passphrase is read from `VAULT_PASSWORD`, or prompted for on the terminal.
//! `--cloud` replicates through the REST table named by `VAULT_CLOUD_URL`,
//! `VAULT_CLOUD_KEY` and `VAULT_CLOUD_TABLE`.
//!
//! Logs go to stderr. `-v` raises the level one step from `warn`;
//! `RUST_LOG` overrides it.

use clap::Parser;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error as ThisError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vault_keeper::{
    config::{VaultConfig, DEVICE_VAR},
    store::Tier,
    sync::CloudSync,
    util::getenv_default,
    Vault,
};
#[cfg(feature = "rest")]
use vault_keeper_rest::{RestCloud, RestOptions};

mod options;
mod passphrase;
use options::{Command, LoadOptions, Main, RestoreOptions, SaveOptions, SyncOptions};
use passphrase::{confirm_new, read_passphrase};

#[tokio::main]
async fn main() {
    let args = Main::parse();
    init_logging(args.verbose);
    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[derive(Debug, ThisError)]
pub(crate) enum Error {
    #[error("{0}")]
    IOError(std::io::Error),

    #[error("{0}")]
    LibError(#[from] vault_keeper::error::Error),

    #[error("Input is not valid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::IOError(e)
    }
}

/// Log filter directive for the number of `-v` flags
pub(crate) fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(verbose)));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    // a second init (tests) keeps the first subscriber
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Vault configuration from the command line, falling back to the environment
pub(crate) fn config_for(args: &Main) -> Result<VaultConfig, Error> {
    let mut config = match &args.data_dir {
        Some(dir) => VaultConfig::in_dir(dir),
        None => VaultConfig::defaults()?,
    };
    config.device = getenv_default(DEVICE_VAR, &config.device);
    if let Some(policy) = args.policy {
        config.policy = policy;
    }
    Ok(config)
}

#[cfg(feature = "rest")]
fn cloud_for(args: &Main, config: &VaultConfig) -> Result<Option<Arc<dyn CloudSync>>, Error> {
    if !args.cloud {
        return Ok(None);
    }
    let mut opts = RestOptions::from_env()?;
    opts.device = config.device.clone();
    let cloud = RestCloud::new(opts)?;
    debug!(table = %cloud.table_url(), device = %config.device, "cloud enabled");
    Ok(Some(Arc::new(cloud)))
}

#[cfg(not(feature = "rest"))]
fn cloud_for(args: &Main, _: &VaultConfig) -> Result<Option<Arc<dyn CloudSync>>, Error> {
    if args.cloud {
        return Err(no_cloud_support());
    }
    Ok(None)
}

#[cfg(not(feature = "rest"))]
fn no_cloud_support() -> Error {
    Error::LibError(vault_keeper::error::Error::Validation(
        "built without cloud support".to_string(),
    ))
}

async fn run(args: Main) -> Result<(), Error> {
    if let Command::CloudTest = args.command {
        return cloud_test().await;
    }
    let config = config_for(&args)?;
    debug!(?config, "configuration");
    let cloud = cloud_for(&args, &config)?;
    let has_cloud = cloud.is_some();

    let (pass, source) =
        read_passphrase().ok_or_else(|| Error::Cancelled("no passphrase".to_string()))?;
    let vault = Vault::connect(&config, &pass, cloud).await?;

    match &args.command {
        Command::Save(opt) => {
            if vault.store().load().await?.is_none() && !confirm_new(&pass, source) {
                return Err(Error::Cancelled("passphrase not confirmed".to_string()));
            }
            save_file(&vault, opt).await
        }
        Command::Load(opt) => load_file(&vault, opt).await,
        Command::Backups => list_backups(&vault).await,
        Command::Restore(opt) => restore(&vault, opt).await,
        Command::TestKey => test_key(&vault).await,
        Command::Identity => {
            println!("{}", vault.identity());
            Ok(())
        }
        Command::Sync(opt) => {
            if !has_cloud {
                return Err(Error::Cancelled("sync needs --cloud".to_string()));
            }
            sync(&vault, opt).await.map(|_| ())
        }
        Command::CloudTest => Ok(()),
    }
}

/// Encrypts the JSON in `opt.file` and saves it
pub(crate) async fn save_file(vault: &Vault, opt: &SaveOptions) -> Result<(), Error> {
    let text = if opt.file == "-" {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        text
    } else {
        tokio::fs::read_to_string(&opt.file).await?
    };
    let record: Value = serde_json::from_str(&text)?;
    let envelope = vault.save_record(&record).await?;
    info!(version = envelope.version(), "saved");
    Ok(())
}

/// Decrypts the current vault and writes it as pretty JSON
pub(crate) async fn load_file(vault: &Vault, opt: &LoadOptions) -> Result<(), Error> {
    let record: Value = vault
        .load_record()
        .await?
        .ok_or_else(|| Error::NotFound("no vault saved yet".to_string()))?;
    let mut text = serde_json::to_string_pretty(&record)?;
    text.push('\n');
    match &opt.output {
        Some(path) => tokio::fs::write(path, text.as_bytes()).await?,
        None => {
            let mut out = tokio::io::stdout();
            out.write_all(text.as_bytes()).await?;
            out.flush().await?;
        }
    }
    Ok(())
}

pub(crate) async fn list_backups(vault: &Vault) -> Result<(), Error> {
    for b in vault.list_backups().await? {
        println!("{}  {}", b.key, b.date);
    }
    Ok(())
}

pub(crate) async fn restore(vault: &Vault, opt: &RestoreOptions) -> Result<(), Error> {
    vault.restore_backup(&opt.key).await?;
    println!("Restored {}", opt.key);
    Ok(())
}

pub(crate) async fn test_key(vault: &Vault) -> Result<(), Error> {
    if vault.test_key().await? {
        println!("Key OK");
        Ok(())
    } else {
        Err(Error::Cancelled("key self-test failed".to_string()))
    }
}

/// Reconciles with the cloud. Returns true if a cloud copy was saved locally.
pub(crate) async fn sync(vault: &Vault, opt: &SyncOptions) -> Result<bool, Error> {
    let outcome = match vault.sync_on_start().await {
        Some(outcome) => outcome,
        None => {
            println!("No cloud copy available");
            return Ok(false);
        }
    };
    let remote = outcome
        .remote_updated_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    println!("Winner: {} (cloud updated {})", outcome.source, remote);
    if outcome.source != Tier::Cloud || !opt.adopt {
        return Ok(false);
    }
    // the cloud copy must open with this passphrase before it replaces anything
    let _: Value = vault.open(&outcome.envelope).await?;
    vault.store().save(&outcome.envelope).await?;
    println!("Saved cloud copy locally");
    Ok(true)
}

#[cfg(feature = "rest")]
async fn cloud_test() -> Result<(), Error> {
    let cloud = RestCloud::from_env()?;
    if cloud.test_connection().await {
        println!("Connected to {}", cloud.table_url());
        Ok(())
    } else {
        Err(Error::NotFound(format!("{} is not reachable", cloud.table_url())))
    }
}

#[cfg(not(feature = "rest"))]
async fn cloud_test() -> Result<(), Error> {
    Err(no_cloud_support())
}
