//! Vault configuration
//!
//! Environment variables, all optional:
//! - `VAULT_DATA_DIR` directory holding the slot database and the flat store.
//!   Default is the platform data directory (e.g. `~/.local/share/vault-keeper` on linux).
//! - `VAULT_DEVICE` free-form device tag recorded with cloud uploads. Default `desktop`.
//! - `VAULT_CONFLICT_POLICY` `remote-wins` (default) or `newest-wins`.

use crate::{
    error::{Error, Result},
    sync::PolicyKind,
    util::getenv_default,
};
use directories::ProjectDirs;
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

pub const DATA_DIR_VAR: &str = "VAULT_DATA_DIR";
pub const DEVICE_VAR: &str = "VAULT_DEVICE";
pub const POLICY_VAR: &str = "VAULT_CONFLICT_POLICY";

const DEFAULT_DEVICE: &str = "desktop";
const DB_FILE: &str = "vault.db";
const FLAT_DIR: &str = "flat";

/// Options for opening a Vault
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultConfig {
    /// directory containing all local tiers
    pub data_dir: PathBuf,
    /// file name of the slot database, inside data_dir
    pub db_file: String,
    /// directory name of the flat store (mirror, identity), inside data_dir
    pub flat_dir: String,
    /// device tag sent with uploads
    pub device: String,
    /// startup conflict policy
    pub policy: PolicyKind,
}

impl VaultConfig {
    /// Default options, rooted in the platform data directory
    pub fn defaults() -> Result<Self, Error> {
        let dirs = ProjectDirs::from("net", "somecool", "vault-keeper").ok_or_else(|| {
            Error::Environment("no home directory: set VAULT_DATA_DIR".to_string())
        })?;
        Ok(Self::in_dir(dirs.data_dir()))
    }

    /// Default options, rooted in `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        VaultConfig {
            data_dir: dir.as_ref().to_path_buf(),
            db_file: DB_FILE.to_string(),
            flat_dir: FLAT_DIR.to_string(),
            device: DEFAULT_DEVICE.to_string(),
            policy: PolicyKind::default(),
        }
    }

    /// Defaults, overridden by environment variables
    pub fn from_env() -> Result<Self, Error> {
        let mut config = match std::env::var_os(DATA_DIR_VAR) {
            Some(dir) if !dir.is_empty() => Self::in_dir(PathBuf::from(dir)),
            _ => Self::defaults()?,
        };
        config.device = getenv_default(DEVICE_VAR, DEFAULT_DEVICE);
        if let Ok(policy) = std::env::var(POLICY_VAR) {
            config.policy = PolicyKind::from_str(policy.trim())?;
        }
        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    pub fn flat_path(&self) -> PathBuf {
        self.data_dir.join(&self.flat_dir)
    }
}
