//! Layered local persistence for envelopes
//!
//! Tiers, in load order:
//! 1. the primary slot of the slot database
//! 2. timestamped backup slots in the same database, newest first
//! 3. an emergency mirror in a flat directory, outside the database
//!
//! Envelopes are opaque here. A copy is usable if it parses and has a
//! version and ciphertext; whether the passphrase opens it is decided later.

use crate::{
    codec::Envelope,
    error::{Error, Result},
    sync::{CloudSync, Identity},
    util::unix_millis,
};
use chrono::{Local, TimeZone};
use serde::Serialize;
use std::{fmt, path::Path, sync::Arc};
use tracing::{debug, info, warn};

pub mod flat;
mod slots;

pub use flat::FlatStore;
pub use slots::{backup_key, backup_timestamp, BACKUP_PREFIX, PRIMARY_KEY};
use flat::MIRROR_KEY;
use slots::{SlotStore, SlotTxn};

#[cfg(test)]
mod test_store;

/// Number of backup slots retained after each save
pub const MAX_BACKUPS: usize = 10;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of backup timestamps
pub trait Clock: Send + Sync + fmt::Debug {
    /// milliseconds since the unix epoch
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        unix_millis()
    }
}

/// Where a copy was found
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    Primary,
    Backup,
    Mirror,
    Cloud,
}

/// An envelope read from local storage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalCopy {
    pub envelope: Envelope,
    pub tier: Tier,
    /// unix ms of the save that wrote it, when known. The mirror has no timestamp.
    pub saved_at: Option<i64>,
}

/// One backup slot, as listed by `list_backups`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BackupInfo {
    pub key: String,
    /// unix ms
    pub timestamp: i64,
    /// local time rendering of `timestamp`
    pub date: String,
}

impl BackupInfo {
    fn new(timestamp: i64, key: String) -> Self {
        let date = Local
            .timestamp_millis_opt(timestamp)
            .single()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        Self {
            key,
            timestamp,
            date,
        }
    }
}

struct CloudLink {
    cloud: Arc<dyn CloudSync>,
    identity: Identity,
}

/// Primary slot, rotating backups, and emergency mirror
pub struct BackupStore {
    slots: SlotStore,
    mirror: FlatStore,
    clock: Arc<dyn Clock>,
    cloud: Option<CloudLink>,
}

impl fmt::Debug for BackupStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupStore")
            .field("slots", &self.slots)
            .field("mirror", &self.mirror)
            .field("cloud", &self.cloud.as_ref().map(|c| &c.identity))
            .finish()
    }
}

impl BackupStore {
    /// Opens a store with the slot database at `db_path` and the mirror
    /// in `mirror_dir`. The database file is created on first use.
    pub fn open(db_path: impl AsRef<Path>, mirror_dir: impl AsRef<Path>) -> Result<Self, Error> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            slots: SlotStore::new(db_path.to_path_buf()),
            mirror: FlatStore::new(mirror_dir.as_ref()),
            clock: Arc::new(SystemClock),
            cloud: None,
        })
    }

    /// Replaces the clock used for backup timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Uploads every saved envelope to `cloud` under `identity`
    pub fn with_cloud(mut self, cloud: Arc<dyn CloudSync>, identity: Identity) -> Self {
        self.cloud = Some(CloudLink { cloud, identity });
        self
    }

    /// the flat directory holding the mirror
    pub fn flat(&self) -> &FlatStore {
        &self.mirror
    }

    /// Saves the envelope as the primary copy and as a new backup, in one
    /// transaction. Then mirrors it and uploads it; failures of those two
    /// steps are logged and do not fail the save.
    pub async fn save(&self, envelope: &Envelope) -> Result<(), Error> {
        let text = envelope.to_json();
        let now = self.clock.now_millis();

        let value = text.clone();
        let key = self
            .slots
            .write(move |txn| {
                // a key at i64::MAX has no successor and is skipped
                let newest = txn
                    .backups()?
                    .iter()
                    .rev()
                    .map(|(ts, _)| *ts)
                    .find(|ts| *ts < i64::MAX);
                let ts = match newest {
                    Some(newest) if newest >= now => newest + 1,
                    _ => now,
                };
                let key = backup_key(ts);
                txn.put(&key, &value)?;
                txn.put(PRIMARY_KEY, &value)?;
                match txn.prune(MAX_BACKUPS) {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "pruned old backups"),
                    Err(e) => warn!(error = %e, "backup pruning failed"),
                }
                Ok(key)
            })
            .await?;
        info!(backup = %key, "vault saved");

        if let Err(e) = self.mirror.set(MIRROR_KEY, &text).await {
            warn!(error = %e, "emergency mirror not written");
        }

        if let Some(link) = &self.cloud {
            match link.cloud.upload(envelope, &link.identity).await {
                Ok(()) => debug!(identity = %link.identity.short(), "uploaded to cloud"),
                Err(e) => warn!(error = %e, "cloud upload failed"),
            }
        }
        Ok(())
    }

    /// Returns the best available envelope, or None if no tier has one
    pub async fn load(&self) -> Result<Option<Envelope>, Error> {
        Ok(self.load_with_tier().await?.map(|c| c.envelope))
    }

    /// Like `load`, also reporting which tier the envelope came from.
    ///
    /// If the slot database can't be read, the mirror is tried. The storage
    /// error is returned only when the mirror has no usable copy either.
    pub async fn load_with_tier(&self) -> Result<Option<LocalCopy>, Error> {
        let slot_err = match self.slots.read(find_in_slots).await {
            Ok(Some(copy)) => {
                debug!(tier = %copy.tier, "loaded");
                return Ok(Some(copy));
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "slot database unreadable, trying mirror");
                Some(e)
            }
        };

        match self.mirror.get(MIRROR_KEY).await {
            Ok(Some(text)) => match usable(&text) {
                Some(envelope) => {
                    info!("recovered vault from emergency mirror");
                    return Ok(Some(LocalCopy {
                        envelope,
                        tier: Tier::Mirror,
                        saved_at: None,
                    }));
                }
                None => warn!("emergency mirror is not a usable envelope"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "emergency mirror unreadable"),
        }

        match slot_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    /// Backups, newest first
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>, Error> {
        let backups = self.slots.read(|txn| txn.backups()).await?;
        Ok(backups
            .into_iter()
            .rev()
            .map(|(ts, key)| BackupInfo::new(ts, key))
            .collect())
    }

    /// Reads one backup slot by key
    pub async fn get_backup(&self, key: &str) -> Result<Option<Envelope>, Error> {
        check_backup_key(key)?;
        let key = key.to_string();
        match self.slots.read(move |txn| txn.get(&key)).await? {
            Some(text) => Ok(Some(Envelope::from_json(&text).map_err(|_| {
                Error::DataCorruption("backup slot is not an envelope".to_string())
            })?)),
            None => Ok(None),
        }
    }

    /// Removes the primary slot. Returns true if it existed.
    pub async fn delete_primary(&self) -> Result<bool, Error> {
        self.slots.write(|txn| txn.delete(PRIMARY_KEY)).await
    }

    /// Removes one backup slot. Returns true if it existed.
    pub async fn delete_backup(&self, key: &str) -> Result<bool, Error> {
        check_backup_key(key)?;
        let key = key.to_string();
        self.slots.write(move |txn| txn.delete(&key)).await
    }

    /// Removes the emergency mirror. Returns true if it existed.
    pub async fn delete_mirror(&self) -> Result<bool, Error> {
        self.mirror.remove(MIRROR_KEY).await
    }
}

fn check_backup_key(key: &str) -> Result<(), Error> {
    match backup_timestamp(key) {
        Some(_) => Ok(()),
        None => Err(Error::Validation(format!("'{}' is not a backup key", key))),
    }
}

/// parses text into an envelope that passes the structural check
fn usable(text: &str) -> Option<Envelope> {
    Envelope::from_json(text)
        .ok()
        .filter(|e| e.is_structurally_valid())
}

fn find_in_slots(txn: &mut SlotTxn<'_>) -> Result<Option<LocalCopy>, Error> {
    if let Some(text) = txn.get(PRIMARY_KEY)? {
        match usable(&text) {
            Some(envelope) => {
                let saved_at = match txn.backups() {
                    Ok(backups) => backups.last().map(|(ts, _)| *ts),
                    Err(e) => {
                        warn!(error = %e, "backup keys unreadable, primary has no timestamp");
                        None
                    }
                };
                return Ok(Some(LocalCopy {
                    envelope,
                    tier: Tier::Primary,
                    saved_at,
                }));
            }
            None => warn!("primary slot is not a usable envelope"),
        }
    }
    for (ts, key) in txn.backups()?.iter().rev() {
        if let Some(envelope) = txn.get(key)?.as_deref().and_then(usable) {
            info!(backup = %key, "recovered vault from backup");
            return Ok(Some(LocalCopy {
                envelope,
                tier: Tier::Backup,
                saved_at: Some(*ts),
            }));
        }
        debug!(backup = %key, "skipping unusable backup");
    }
    Ok(None)
}
