use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use vault_keeper::sync::PolicyKind;

#[derive(Parser, Clone, Debug)]
#[command(name = "vault", version)]
// derive version from Cargo.toml
pub struct Main {
    /// Verbose mode (-v, -vv, -vvv, etc.)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory for the local store
    #[arg(long, env = "VAULT_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Replicate through the REST table configured in VAULT_CLOUD_URL and VAULT_CLOUD_KEY
    #[arg(long, global = true)]
    pub cloud: bool,

    /// Which copy wins at sync when both exist: remote-wins or newest-wins
    #[arg(long, env = "VAULT_CONFLICT_POLICY", global = true)]
    pub policy: Option<PolicyKind>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Encrypt a JSON record and save it as the current vault
    Save(SaveOptions),

    /// Decrypt and print the current vault
    Load(LoadOptions),

    /// List backups, newest first
    Backups,

    /// Make a backup the current vault
    Restore(RestoreOptions),

    /// Check the passphrase and crypto pipeline without touching stored data
    #[command(name = "test-key")]
    TestKey,

    /// Print the replication identity
    Identity,

    /// Compare with the cloud copy
    Sync(SyncOptions),

    /// Check that the cloud table is reachable
    #[command(name = "cloud-test")]
    CloudTest,
}

#[derive(Args, Clone, Debug)]
pub struct SaveOptions {
    /// JSON file to encrypt, `-` for stdin
    #[arg(value_name = "FILE", default_value = "-")]
    pub file: String,
}

#[derive(Args, Clone, Debug)]
pub struct LoadOptions {
    /// Output file (default stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct RestoreOptions {
    /// Backup key, as listed by `vault backups`
    #[arg(value_name = "KEY")]
    pub key: String,
}

#[derive(Args, Clone, Debug)]
pub struct SyncOptions {
    /// Save the winning copy locally if it came from the cloud
    #[arg(long)]
    pub adopt: bool,
}
