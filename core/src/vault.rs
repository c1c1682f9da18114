//! Vault: codec and store bound to one passphrase

use crate::{
    codec::{self, Envelope},
    config::VaultConfig,
    error::{Error, Result},
    store::{BackupInfo, BackupStore},
    sync::{self, CloudSync, ConflictPolicy, Identity, SyncOutcome},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, sync::Arc};
use tracing::info;
use zeroize::Zeroizing;

/// An open vault session
pub struct Vault {
    store: BackupStore,
    cloud: Option<Arc<dyn CloudSync>>,
    policy: Arc<dyn ConflictPolicy>,
    identity: Identity,
    passphrase: Zeroizing<String>,
}

/// Implementation of Debug that doesn't print the passphrase
impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("store", &self.store)
            .field("identity", &self.identity)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Vault {
    /// Opens the local store, resolves the replication identity, and links
    /// the cloud collaborator if one is given.
    pub async fn connect(
        config: &VaultConfig,
        passphrase: &str,
        cloud: Option<Arc<dyn CloudSync>>,
    ) -> Result<Self, Error> {
        if passphrase.is_empty() {
            return Err(Error::Validation("passphrase may not be empty".to_string()));
        }
        let mut store = BackupStore::open(config.db_path(), config.flat_path())?;
        let identity = Identity::resolve(store.flat(), passphrase).await?;
        if let Some(cloud) = &cloud {
            store = store.with_cloud(cloud.clone(), identity.clone());
        }
        info!(
            data_dir = %config.data_dir.display(),
            cloud = cloud.is_some(),
            "vault opened"
        );
        Ok(Vault {
            store,
            cloud,
            policy: config.policy.policy(),
            identity,
            passphrase: Zeroizing::new(passphrase.to_string()),
        })
    }

    /// Replaces the startup conflict policy
    pub fn with_policy(mut self, policy: Arc<dyn ConflictPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Encrypts and saves a record. Returns the envelope that was stored.
    pub async fn save_record<T>(&self, record: &T) -> Result<Envelope, Error>
    where
        T: Serialize + ?Sized,
    {
        let envelope = codec::encrypt(record, &self.passphrase).await?;
        self.store.save(&envelope).await?;
        Ok(envelope)
    }

    /// Loads and decrypts the best available copy, or None if there is none
    pub async fn load_record<T>(&self) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        match self.store.load().await? {
            Some(envelope) => Ok(Some(codec::decrypt(&envelope, &self.passphrase).await?)),
            None => Ok(None),
        }
    }

    /// Decrypts an envelope with the session passphrase
    pub async fn open<T>(&self, envelope: &Envelope) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        codec::decrypt(envelope, &self.passphrase).await
    }

    /// Reconciles with the cloud copy. None if no cloud is linked, the
    /// cloud has no copy, or it couldn't be reached.
    pub async fn sync_on_start(&self) -> Option<SyncOutcome> {
        let cloud = self.cloud.as_deref()?;
        sync::sync_on_start(&self.store, cloud, &self.identity, self.policy.as_ref()).await
    }

    /// Makes a backup the current copy, after checking that the session
    /// passphrase opens it. The restored copy is saved as a new backup too.
    pub async fn restore_backup(&self, key: &str) -> Result<(), Error> {
        let envelope = self
            .store
            .get_backup(key)
            .await?
            .ok_or_else(|| Error::Validation(format!("no backup '{}'", key)))?;
        let _: serde_json::Value = codec::decrypt(&envelope, &self.passphrase).await?;
        self.store.save(&envelope).await?;
        info!(backup = %key, "restored backup");
        Ok(())
    }

    /// Backups, newest first
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>, Error> {
        self.store.list_backups().await
    }

    /// Runs the crypto self-test with the session passphrase
    pub async fn test_key(&self) -> Result<bool, Error> {
        codec::test_key(&self.passphrase).await
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn store(&self) -> &BackupStore {
        &self.store
    }
}
