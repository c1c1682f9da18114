use super::*;
use crate::{
    codec::EnvelopeVersion,
    sync::{MemoryCloud, RemoteCopy},
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use vault_keeper_test_util::temp_dir;

/// Clock that only moves when the test sets it
#[derive(Debug)]
struct ManualClock(AtomicI64);

impl ManualClock {
    fn at(ms: i64) -> Arc<Self> {
        Arc::new(ManualClock(AtomicI64::new(ms)))
    }
    fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct OfflineCloud;

#[async_trait]
impl CloudSync for OfflineCloud {
    async fn upload(&self, _: &Envelope, _: &Identity) -> Result<(), Error> {
        Err(Error::Sync("network unreachable".to_string()))
    }
    async fn download(&self, _: &Identity) -> Result<Option<RemoteCopy>, Error> {
        Err(Error::Sync("network unreachable".to_string()))
    }
}

/// opaque envelope distinguishable by `n`
fn envelope(n: u8) -> Envelope {
    Envelope::new(EnvelopeVersion::V2, &[n; 16], &[n; 12], &[n; 40])
}

fn open_in(dir: &mktemp::Temp) -> Result<BackupStore, Error> {
    BackupStore::open(dir.as_path().join("vault.db"), dir.as_path().join("flat"))
}

#[tokio::test]
async fn empty_store_loads_nothing() -> Result<(), Error> {
    let dir = temp_dir()?;
    let store = open_in(&dir)?;
    assert_eq!(store.load().await?, None);
    assert!(store.list_backups().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn save_then_load_primary() -> Result<(), Error> {
    let dir = temp_dir()?;
    let clock = ManualClock::at(1_000);
    let store = open_in(&dir)?.with_clock(clock.clone());

    store.save(&envelope(1)).await?;
    clock.set(2_000);
    store.save(&envelope(2)).await?;

    let copy = store.load_with_tier().await?.expect("copy");
    assert_eq!(copy.tier, Tier::Primary);
    assert_eq!(copy.envelope, envelope(2));
    assert_eq!(copy.saved_at, Some(2_000));
    Ok(())
}

#[tokio::test]
async fn keeps_ten_newest_backups() -> Result<(), Error> {
    let dir = temp_dir()?;
    let clock = ManualClock::at(0);
    let store = open_in(&dir)?.with_clock(clock.clone());

    for i in 0..15u8 {
        clock.set(1_000 + i as i64);
        store.save(&envelope(i)).await?;
    }
    let backups = store.list_backups().await?;
    assert_eq!(backups.len(), MAX_BACKUPS);
    let stamps: Vec<i64> = backups.iter().map(|b| b.timestamp).collect();
    let expected: Vec<i64> = (1_005..1_015).rev().collect();
    assert_eq!(stamps, expected, "newest first");
    assert_eq!(backups[0].key, "backup_1014");
    assert!(!backups[0].date.is_empty());
    Ok(())
}

#[tokio::test]
async fn same_millisecond_saves_keep_distinct_backups() -> Result<(), Error> {
    let dir = temp_dir()?;
    let store = open_in(&dir)?.with_clock(ManualClock::at(5_000));

    for i in 0..3u8 {
        store.save(&envelope(i)).await?;
    }
    let stamps: Vec<i64> = store
        .list_backups()
        .await?
        .into_iter()
        .map(|b| b.timestamp)
        .collect();
    assert_eq!(stamps, vec![5_002, 5_001, 5_000]);

    // a clock that goes backwards still moves forward
    let store = store.with_clock(ManualClock::at(10));
    store.save(&envelope(9)).await?;
    assert_eq!(store.list_backups().await?[0].timestamp, 5_003);
    Ok(())
}

#[tokio::test]
async fn newest_backup_when_primary_missing() -> Result<(), Error> {
    let dir = temp_dir()?;
    let clock = ManualClock::at(0);
    let store = open_in(&dir)?.with_clock(clock.clone());

    for (ts, n) in [(100, 1u8), (200, 2), (300, 3)] {
        clock.set(ts);
        store.save(&envelope(n)).await?;
    }
    assert!(store.delete_primary().await?);

    let copy = store.load_with_tier().await?.expect("copy");
    assert_eq!(copy.tier, Tier::Backup);
    assert_eq!(copy.saved_at, Some(300));
    assert_eq!(copy.envelope, envelope(3));
    Ok(())
}

#[tokio::test]
async fn skips_unusable_slots() -> Result<(), Error> {
    let dir = temp_dir()?;
    let clock = ManualClock::at(100);
    let store = open_in(&dir)?.with_clock(clock.clone());
    store.save(&envelope(1)).await?;
    clock.set(200);
    store.save(&envelope(2)).await?;

    // corrupt the primary and the newest backup
    store
        .slots
        .write(|txn| {
            txn.put(PRIMARY_KEY, "{\"version\":2")?;
            txn.put(&backup_key(200), "{\"version\":2,\"data\":\"\"}")
        })
        .await?;

    let copy = store.load_with_tier().await?.expect("copy");
    assert_eq!(copy.tier, Tier::Backup);
    assert_eq!(copy.envelope, envelope(1));
    Ok(())
}

#[tokio::test]
async fn mirror_when_slots_empty() -> Result<(), Error> {
    let dir = temp_dir()?;
    let clock = ManualClock::at(100);
    let store = open_in(&dir)?.with_clock(clock);
    store.save(&envelope(7)).await?;

    assert!(store.delete_primary().await?);
    assert!(store.delete_backup("backup_100").await?);

    let copy = store.load_with_tier().await?.expect("copy");
    assert_eq!(copy.tier, Tier::Mirror);
    assert_eq!(copy.saved_at, None);
    assert_eq!(copy.envelope, envelope(7));

    assert!(store.delete_mirror().await?);
    assert_eq!(store.load().await?, None);
    Ok(())
}

#[tokio::test]
async fn mirror_when_database_corrupt() -> Result<(), Error> {
    let dir = temp_dir()?;
    let store = open_in(&dir)?;
    store.save(&envelope(4)).await?;

    std::fs::write(dir.as_path().join("vault.db"), vec![0xa5; 8192])?;

    let copy = store.load_with_tier().await?.expect("copy");
    assert_eq!(copy.tier, Tier::Mirror);
    assert_eq!(copy.envelope, envelope(4));

    // with the mirror gone too, the storage error surfaces
    store.delete_mirror().await?;
    assert!(matches!(store.load().await, Err(Error::Storage(_))));
    Ok(())
}

#[tokio::test]
async fn failed_upload_does_not_fail_save() -> Result<(), Error> {
    let dir = temp_dir()?;
    let store =
        open_in(&dir)?.with_cloud(Arc::new(OfflineCloud), Identity::from_passphrase("pw"));
    store.save(&envelope(1)).await?;
    assert_eq!(store.load().await?, Some(envelope(1)));
    Ok(())
}

#[tokio::test]
async fn upload_after_save() -> Result<(), Error> {
    let dir = temp_dir()?;
    let cloud = Arc::new(MemoryCloud::new("desktop"));
    let id = Identity::from_passphrase("pw");
    let store = open_in(&dir)?.with_cloud(cloud.clone(), id.clone());
    assert!(cloud.is_empty().await);

    store.save(&envelope(1)).await?;
    store.save(&envelope(2)).await?;
    let remote = cloud.get(&id).await.expect("uploaded");
    assert_eq!(remote.envelope, envelope(2));
    assert_eq!(remote.device, "desktop");
    assert_eq!(cloud.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn backup_maintenance() -> Result<(), Error> {
    let dir = temp_dir()?;
    let store = open_in(&dir)?.with_clock(ManualClock::at(42));
    store.save(&envelope(3)).await?;

    assert_eq!(store.get_backup("backup_42").await?, Some(envelope(3)));
    assert_eq!(store.get_backup("backup_43").await?, None);
    assert!(matches!(
        store.delete_backup(PRIMARY_KEY).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        store.get_backup("../data").await,
        Err(Error::Validation(_))
    ));
    assert!(!store.delete_backup("backup_43").await?);
    Ok(())
}

#[tokio::test]
async fn failed_mirror_write_does_not_fail_save() -> Result<(), Error> {
    let dir = temp_dir()?;
    // a plain file where the mirror directory should be
    let not_a_dir = dir.as_path().join("flat");
    std::fs::write(&not_a_dir, b"x")?;
    let store = BackupStore::open(dir.as_path().join("vault.db"), &not_a_dir)?;

    store.save(&envelope(5)).await?;
    assert_eq!(store.load().await?, Some(envelope(5)));
    Ok(())
}

#[tokio::test]
async fn failed_prune_keeps_the_save() -> Result<(), Error> {
    let dir = temp_dir()?;
    let clock = ManualClock::at(0);
    let store = open_in(&dir)?.with_clock(clock.clone());
    store.save(&envelope(0)).await?;

    // every delete on the table now aborts
    rusqlite::Connection::open(dir.as_path().join("vault.db"))?.execute_batch(
        "CREATE TRIGGER no_delete BEFORE DELETE ON vault BEGIN SELECT RAISE(ABORT, 'locked'); END",
    )?;

    for i in 1..12u8 {
        clock.set(i as i64);
        store.save(&envelope(i)).await?;
    }
    let copy = store.load_with_tier().await?.expect("copy");
    assert_eq!(copy.tier, Tier::Primary);
    assert_eq!(copy.envelope, envelope(11));
    assert_eq!(copy.saved_at, Some(11));
    assert_eq!(store.list_backups().await?.len(), 12, "nothing pruned");
    Ok(())
}

#[tokio::test]
async fn backup_key_at_max_timestamp() -> Result<(), Error> {
    let dir = temp_dir()?;
    let store = open_in(&dir)?.with_clock(ManualClock::at(700));
    store
        .slots
        .write(|txn| txn.put(&backup_key(i64::MAX), &envelope(1).to_json()))
        .await?;

    store.save(&envelope(2)).await?;
    store.save(&envelope(3)).await?;
    assert_eq!(store.load().await?, Some(envelope(3)));
    assert_eq!(store.get_backup("backup_700").await?, Some(envelope(2)));
    assert_eq!(store.get_backup("backup_701").await?, Some(envelope(3)));
    assert_eq!(store.list_backups().await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn primary_loads_when_backup_keys_unreadable() -> Result<(), Error> {
    let dir = temp_dir()?;
    let store = open_in(&dir)?.with_clock(ManualClock::at(900));
    store.save(&envelope(6)).await?;

    // a blob key can't be listed as text
    rusqlite::Connection::open(dir.as_path().join("vault.db"))?
        .execute_batch("INSERT INTO vault (key, value) VALUES (X'FF00', 'x')")?;

    let copy = store.load_with_tier().await?.expect("copy");
    assert_eq!(copy.tier, Tier::Primary);
    assert_eq!(copy.envelope, envelope(6));
    assert_eq!(copy.saved_at, None);
    Ok(())
}
