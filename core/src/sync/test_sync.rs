use super::*;
use crate::codec::EnvelopeVersion;
use chrono::TimeZone;
use std::str::FromStr;
use vault_keeper_test_util::temp_dir;

struct BrokenCloud;

#[async_trait]
impl CloudSync for BrokenCloud {
    async fn upload(&self, _: &Envelope, _: &Identity) -> Result<(), Error> {
        Err(Error::Sync("401 unauthorized".to_string()))
    }
    async fn download(&self, _: &Identity) -> Result<Option<RemoteCopy>, Error> {
        Err(Error::Sync("401 unauthorized".to_string()))
    }
}

fn envelope(n: u8) -> Envelope {
    Envelope::new(EnvelopeVersion::V2, &[n; 16], &[n; 12], &[n; 24])
}

fn remote(n: u8, ms: i64) -> RemoteCopy {
    RemoteCopy {
        envelope: envelope(n),
        updated_at: Utc.timestamp_millis_opt(ms).single().expect("time"),
        device: "mobile".to_string(),
    }
}

fn local(saved_at: Option<i64>) -> LocalCopy {
    LocalCopy {
        envelope: envelope(1),
        tier: Tier::Primary,
        saved_at,
    }
}

#[test]
fn identity_is_stable_and_distinct() {
    let a = Identity::from_passphrase("pw123");
    assert_eq!(a, Identity::from_passphrase("pw123"));
    assert_ne!(a, Identity::from_passphrase("pw124"));
    assert!(a.as_str().starts_with("vault_"));
    assert_eq!(a.as_str().len(), "vault_".len() + 32);
}

#[test]
fn identity_known_value() {
    // sha256("") = e3b0c44298fc1c149afbf4c8996fb924...
    assert_eq!(
        Identity::from_passphrase("").as_str(),
        "vault_e3b0c44298fc1c149afbf4c8996fb924"
    );
}

#[test]
fn identity_parse_and_debug() {
    let id = Identity::from_passphrase("pw");
    assert_eq!(Identity::parse(id.as_str()).expect("parse"), id);
    assert_eq!(Identity::parse(&format!("{}\n", id)).expect("trim"), id);
    for bad in ["", "vault_", "user_e3b0c44298fc1c149afbf4c8996fb924", "vault_E3B0C44298FC1C149AFBF4C8996FB924"] {
        assert!(Identity::parse(bad).is_err(), "{}", bad);
    }
    let dbg = format!("{:?}", id);
    assert!(!dbg.contains(id.as_str()));
    assert!(dbg.starts_with("Identity(vault_"));
}

#[tokio::test]
async fn identity_first_write_wins() -> Result<(), Error> {
    let dir = temp_dir()?;
    let flat = FlatStore::new(dir.as_path());

    let first = Identity::resolve(&flat, "first passphrase").await?;
    assert_eq!(first, Identity::from_passphrase("first passphrase"));
    let again = Identity::resolve(&flat, "another passphrase").await?;
    assert_eq!(again, first, "persisted identity is never replaced");

    flat.set(IDENTITY_KEY, "garbage").await?;
    assert!(matches!(
        Identity::resolve(&flat, "x").await,
        Err(Error::DataCorruption(_))
    ));
    Ok(())
}

#[test]
fn policies() {
    let remote = remote(2, 2_000);
    assert_eq!(RemoteWins.resolve(&local(Some(9_000)), &remote), Resolution::AdoptRemote);

    assert_eq!(NewestWins.resolve(&local(Some(9_000)), &remote), Resolution::KeepLocal);
    assert_eq!(NewestWins.resolve(&local(Some(2_000)), &remote), Resolution::AdoptRemote);
    assert_eq!(NewestWins.resolve(&local(None), &remote), Resolution::AdoptRemote);
}

#[test]
fn policy_names() -> Result<(), Error> {
    assert_eq!(PolicyKind::default(), PolicyKind::RemoteWins);
    assert_eq!(PolicyKind::from_str("newest-wins")?, PolicyKind::NewestWins);
    assert_eq!(PolicyKind::RemoteWins.to_string(), "remote-wins");
    assert!(PolicyKind::from_str("local-wins").is_err());
    Ok(())
}

#[tokio::test]
async fn has_newer() {
    let id = Identity::from_passphrase("pw");
    let cloud = MemoryCloud::new("mobile");
    assert!(!cloud.has_newer(0, &id).await, "no remote row");

    cloud.put(&id, remote(1, 5_000)).await;
    assert!(cloud.has_newer(4_999, &id).await);
    assert!(!cloud.has_newer(5_000, &id).await);
    assert!(!BrokenCloud.has_newer(0, &id).await, "errors read as false");
}

#[tokio::test]
async fn start_sync() -> Result<(), Error> {
    let dir = temp_dir()?;
    let store = BackupStore::open(dir.as_path().join("v.db"), dir.as_path().join("flat"))?;
    let id = Identity::from_passphrase("pw");
    let cloud = MemoryCloud::new("mobile");

    // nothing anywhere
    assert_eq!(sync_on_start(&store, &cloud, &id, &RemoteWins).await, None);

    // remote only: adopted
    cloud.put(&id, remote(5, 1_000)).await;
    let out = sync_on_start(&store, &cloud, &id, &RemoteWins).await.expect("outcome");
    assert_eq!(out.source, Tier::Cloud);
    assert_eq!(out.envelope, envelope(5));
    assert_eq!(out.local_saved_at, None);
    assert!(store.load().await?.is_none(), "sync doesn't write locally");

    // both, local newer
    store.save(&envelope(6)).await?;
    let out = sync_on_start(&store, &cloud, &id, &RemoteWins).await.expect("outcome");
    assert_eq!(out.source, Tier::Cloud, "remote wins by default");
    assert_eq!(out.envelope, envelope(5));
    assert!(out.local_saved_at.is_some());

    let out = sync_on_start(&store, &cloud, &id, &NewestWins).await.expect("outcome");
    assert_eq!(out.source, Tier::Primary);
    assert_eq!(out.envelope, envelope(6));
    assert_eq!(
        out.remote_updated_at.map(|t| t.timestamp_millis()),
        Some(1_000)
    );

    // unreachable cloud
    assert_eq!(sync_on_start(&store, &BrokenCloud, &id, &RemoteWins).await, None);
    Ok(())
}
