//! Transactional slot database: one primary slot plus timestamped backups,
//! in a single SQLite table.
//!
//! A connection is opened for each operation and dropped when it returns,
//! on every path. A transaction that isn't committed is rolled back on drop.

use crate::error::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::{path::PathBuf, time::Duration};

/// key of the primary slot
pub const PRIMARY_KEY: &str = "data";
/// prefix of backup slot keys; the suffix is a unix-ms timestamp
pub const BACKUP_PREFIX: &str = "backup_";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS vault (key TEXT PRIMARY KEY, value TEXT NOT NULL)";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns the backup key for a timestamp
pub fn backup_key(ts: i64) -> String {
    format!("{}{}", BACKUP_PREFIX, ts)
}

/// Parses the timestamp out of a backup key.
/// Returns None for the primary key and anything else not shaped like a backup key.
pub fn backup_timestamp(key: &str) -> Option<i64> {
    key.strip_prefix(BACKUP_PREFIX)?.parse().ok()
}

/// Handle to the slot database file. Holds no connection.
#[derive(Clone, Debug)]
pub(crate) struct SlotStore {
    path: PathBuf,
}

impl SlotStore {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn connect(&self) -> Result<Connection, Error> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    /// Runs `f` inside a read-only transaction on the blocking pool
    pub(crate) async fn read<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut SlotTxn<'_>) -> Result<R, Error> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = store.connect()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
            tx.pragma_update(None, "query_only", true)?;
            let mut txn = SlotTxn { tx };
            // read-only, so no commit; dropping `txn` ends it
            f(&mut txn)
        })
        .await?
    }

    /// Runs `f` inside a read-write transaction on the blocking pool.
    /// Commits only if `f` returns Ok.
    pub(crate) async fn write<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut SlotTxn<'_>) -> Result<R, Error> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = store.connect()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut txn = SlotTxn { tx };
            let res = f(&mut txn)?;
            txn.tx.commit()?;
            Ok(res)
        })
        .await?
    }
}

/// Operations available inside a slot transaction
pub(crate) struct SlotTxn<'c> {
    tx: Transaction<'c>,
}

impl<'c> SlotTxn<'c> {
    pub(crate) fn put(&self, key: &str, value: &str) -> Result<(), Error> {
        put(&self.tx, key, value)
    }

    pub(crate) fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self
            .tx
            .query_row("SELECT value FROM vault WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    pub(crate) fn get_all_keys(&self) -> Result<Vec<String>, Error> {
        all_keys(&self.tx)
    }

    /// Returns true if the key existed
    pub(crate) fn delete(&self, key: &str) -> Result<bool, Error> {
        delete(&self.tx, key)
    }

    /// Backup slots as (timestamp, key), oldest first
    pub(crate) fn backups(&self) -> Result<Vec<(i64, String)>, Error> {
        backups(&self.tx)
    }

    /// Deletes all but the newest `keep` backups, inside a savepoint.
    /// On error the savepoint is rolled back and the enclosing transaction
    /// is left as it was.
    pub(crate) fn prune(&mut self, keep: usize) -> Result<usize, Error> {
        let sp = self.tx.savepoint()?;
        let existing = backups(&sp)?;
        let excess = existing.len().saturating_sub(keep);
        for (_, key) in existing.iter().take(excess) {
            delete(&sp, key)?;
        }
        sp.commit()?;
        Ok(excess)
    }
}

fn put(conn: &Connection, key: &str, value: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO vault (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn delete(conn: &Connection, key: &str) -> Result<bool, Error> {
    Ok(conn.execute("DELETE FROM vault WHERE key = ?1", params![key])? > 0)
}

fn all_keys(conn: &Connection) -> Result<Vec<String>, Error> {
    let mut stmt = conn.prepare("SELECT key FROM vault")?;
    let keys = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys)
}

fn backups(conn: &Connection) -> Result<Vec<(i64, String)>, Error> {
    let mut found: Vec<(i64, String)> = all_keys(conn)?
        .into_iter()
        .filter_map(|k| backup_timestamp(&k).map(|ts| (ts, k)))
        .collect();
    found.sort();
    Ok(found)
}
