//! Off-device replication
//!
//! A [`CloudSync`] implementation stores one envelope per [`Identity`].
//! Replication is best-effort: every error stops at the functions in this
//! module and is logged, never returned to the local save or load path.
//!
//! The identity is a hash of the passphrase, so the same passphrase on any
//! device finds the same remote row. That also means the remote key is
//! derived from secret material, and anyone who can guess the passphrase can
//! locate the row (its contents are still encrypted under the slow KDF).

use crate::{
    codec::Envelope,
    error::{Error, Result},
    store::{flat::IDENTITY_KEY, BackupStore, FlatStore, LocalCopy, Tier},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{fmt, sync::Arc};
use tracing::{debug, info, warn};

mod memory;
pub use memory::MemoryCloud;

#[cfg(test)]
mod test_sync;

const IDENTITY_PREFIX: &str = "vault_";
const IDENTITY_HASH_BYTES: usize = 16;

/// Replication key shared by every device that uses the same passphrase
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Derives the identity: `vault_` followed by the hex of the first
    /// 16 bytes of SHA-256(passphrase)
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        Identity(format!(
            "{}{}",
            IDENTITY_PREFIX,
            hex::encode(&digest[..IDENTITY_HASH_BYTES])
        ))
    }

    /// Parses a persisted identity token
    pub fn parse(token: &str) -> Result<Self, Error> {
        let token = token.trim();
        let valid = token
            .strip_prefix(IDENTITY_PREFIX)
            .map(|h| {
                h.len() == IDENTITY_HASH_BYTES * 2
                    && h.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
            })
            .unwrap_or(false);
        if !valid {
            return Err(Error::Validation("malformed identity token".to_string()));
        }
        Ok(Identity(token.to_string()))
    }

    /// Returns the persisted identity, persisting the passphrase-derived one
    /// if none exists yet. An existing value is never replaced.
    pub async fn resolve(flat: &FlatStore, passphrase: &str) -> Result<Self, Error> {
        let derived = Identity::from_passphrase(passphrase);
        if flat.set_if_absent(IDENTITY_KEY, derived.as_str()).await? {
            info!(identity = %derived.short(), "persisted new identity");
            return Ok(derived);
        }
        match flat.get(IDENTITY_KEY).await? {
            Some(text) => Identity::parse(&text).map_err(|_| {
                Error::DataCorruption(format!("persisted '{}' is not an identity", IDENTITY_KEY))
            }),
            // removed between the two calls
            None => Err(Error::Storage(format!("'{}' disappeared", IDENTITY_KEY))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// prefix suitable for logs
    pub fn short(&self) -> &str {
        let end = std::cmp::min(self.0.len(), IDENTITY_PREFIX.len() + 6);
        &self.0[..end]
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Debug shows only the short prefix
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({}..)", self.short())
    }
}

/// The remote row for an identity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteCopy {
    pub envelope: Envelope,
    pub updated_at: DateTime<Utc>,
    pub device: String,
}

/// Off-device store of one envelope per identity
#[async_trait]
pub trait CloudSync: Send + Sync {
    /// Stores the envelope for the identity, replacing any previous one
    async fn upload(&self, envelope: &Envelope, identity: &Identity) -> Result<(), Error>;

    /// Fetches the envelope for the identity.
    /// `Ok(None)` means no row exists, which is not an error.
    async fn download(&self, identity: &Identity) -> Result<Option<RemoteCopy>, Error>;

    /// Returns true if the remote copy was updated after `local_ts` (unix ms).
    /// Errors are logged and reported as false.
    async fn has_newer(&self, local_ts: i64, identity: &Identity) -> bool {
        match self.download(identity).await {
            Ok(Some(remote)) => remote.updated_at.timestamp_millis() > local_ts,
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "checking for newer cloud data failed");
                false
            }
        }
    }
}

/// Which side wins when both a local and a remote copy exist
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    KeepLocal,
    AdoptRemote,
}

/// Decides between a local and a remote copy at startup
pub trait ConflictPolicy: Send + Sync + fmt::Debug {
    fn resolve(&self, local: &LocalCopy, remote: &RemoteCopy) -> Resolution;
}

/// Remote copy always wins
#[derive(Clone, Copy, Debug, Default)]
pub struct RemoteWins;

impl ConflictPolicy for RemoteWins {
    fn resolve(&self, _: &LocalCopy, _: &RemoteCopy) -> Resolution {
        Resolution::AdoptRemote
    }
}

/// The copy with the later timestamp wins. Remote wins ties, and also wins
/// when the local copy has no timestamp (mirror tier).
#[derive(Clone, Copy, Debug, Default)]
pub struct NewestWins;

impl ConflictPolicy for NewestWins {
    fn resolve(&self, local: &LocalCopy, remote: &RemoteCopy) -> Resolution {
        match local.saved_at {
            Some(ts) if ts > remote.updated_at.timestamp_millis() => Resolution::KeepLocal,
            _ => Resolution::AdoptRemote,
        }
    }
}

/// Named policies, for configuration
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum PolicyKind {
    #[default]
    RemoteWins,
    NewestWins,
}

impl PolicyKind {
    pub fn policy(self) -> Arc<dyn ConflictPolicy> {
        match self {
            PolicyKind::RemoteWins => Arc::new(RemoteWins),
            PolicyKind::NewestWins => Arc::new(NewestWins),
        }
    }
}

/// Result of a startup sync
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOutcome {
    /// the envelope the caller should use
    pub envelope: Envelope,
    /// where `envelope` came from; `Tier::Cloud` if the remote copy was adopted
    pub source: Tier,
    /// timestamp of the local copy, if there was one and it had a timestamp
    pub local_saved_at: Option<i64>,
    /// timestamp of the remote copy
    pub remote_updated_at: Option<DateTime<Utc>>,
}

/// Reconciles the local store with the remote copy.
///
/// Returns None when there is no remote copy or the cloud is unreachable.
/// Nothing is written locally; the caller decides whether to save an
/// adopted copy.
pub async fn sync_on_start(
    store: &BackupStore,
    cloud: &dyn CloudSync,
    identity: &Identity,
    policy: &dyn ConflictPolicy,
) -> Option<SyncOutcome> {
    let remote = match cloud.download(identity).await {
        Ok(Some(remote)) => remote,
        Ok(None) => {
            debug!("no cloud copy");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "cloud sync skipped");
            return None;
        }
    };
    let local = match store.load_with_tier().await {
        Ok(local) => local,
        Err(e) => {
            warn!(error = %e, "local store unreadable during sync");
            None
        }
    };
    let remote_updated_at = Some(remote.updated_at);
    let outcome = match local {
        None => {
            info!(device = %remote.device, "adopting cloud copy, no local data");
            SyncOutcome {
                envelope: remote.envelope,
                source: Tier::Cloud,
                local_saved_at: None,
                remote_updated_at,
            }
        }
        Some(local) => match policy.resolve(&local, &remote) {
            Resolution::AdoptRemote => {
                info!(device = %remote.device, ?policy, "adopting cloud copy");
                SyncOutcome {
                    envelope: remote.envelope,
                    source: Tier::Cloud,
                    local_saved_at: local.saved_at,
                    remote_updated_at,
                }
            }
            Resolution::KeepLocal => {
                info!(tier = %local.tier, ?policy, "keeping local copy");
                SyncOutcome {
                    envelope: local.envelope,
                    source: local.tier,
                    local_saved_at: local.saved_at,
                    remote_updated_at,
                }
            }
        },
    };
    Some(outcome)
}
