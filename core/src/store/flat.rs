//! Flat key-value directory, one file per key.
//!
//! Not transactional. Writes go to a temporary sibling file that is then
//! renamed over the target, so a reader sees either the old or the new value.

use crate::{
    error::{Error, Result},
    rand,
};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// key of the emergency copy of the most recent envelope
pub const MIRROR_KEY: &str = "vault_emergency_backup";
/// key of the persisted replication identity
pub const IDENTITY_KEY: &str = "vault_user_id";

#[derive(Clone, Debug)]
pub struct FlatStore {
    dir: PathBuf,
}

impl FlatStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, key: &str) -> Result<PathBuf, Error> {
        let valid = !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(Error::Validation(format!("invalid store key '{}'", key)));
        }
        Ok(self.dir.join(key))
    }

    fn tmp_path_of(&self, key: &str) -> Result<PathBuf, Error> {
        let suffix: [u8; 4] = rand::random_array()?;
        Ok(self.dir.join(format!(".{}.tmp.{}", key, hex::encode(suffix))))
    }

    /// Returns the value, or None if the key was never set
    pub async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        match tokio::fs::read_to_string(self.path_of(key)?).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Stores the value, replacing any previous one
    pub async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let target = self.path_of(key)?;
        let tmp = self.write_tmp(key, value).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Stores the value only if the key has no value yet.
    /// Returns false, leaving the existing value untouched, if it did.
    pub async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, Error> {
        let target = self.path_of(key)?;
        let tmp = self.write_tmp(key, value).await?;
        // hard_link fails if the target exists, and never exposes a partial file
        let res = tokio::fs::hard_link(&tmp, &target).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        match res {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the key. Returns true if it existed.
    pub async fn remove(&self, key: &str) -> Result<bool, Error> {
        match tokio::fs::remove_file(self.path_of(key)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_tmp(&self, key: &str, value: &str) -> Result<PathBuf, Error> {
        use tokio::io::AsyncWriteExt;

        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = self.tmp_path_of(key)?;
        let mut file = tokio::fs::File::create(&tmp).await?;
        let written = match file.write_all(value.as_bytes()).await {
            Ok(()) => file.sync_all().await,
            Err(e) => Err(e),
        };
        drop(file);
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(tmp)
    }
}
