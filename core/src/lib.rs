//! # Vault-Keeper
//!
//! Passphrase-encrypted vault envelopes, with layered local backups and
//! best-effort cloud replication.
//!
//! A record (anything `serde` can serialize) is encrypted into an
//! [`Envelope`](codec/struct.Envelope.html): the JSON form of the record is
//! compressed, then sealed with AES-256-GCM under a key derived from the
//! passphrase with PBKDF2+HMAC+SHA256 and a fresh random salt.
//!
//! Envelopes are saved by a [`BackupStore`](store/struct.BackupStore.html)
//! into three local tiers:
//! - the primary slot of a SQLite database
//! - up to ten timestamped backup slots in the same database
//! - an emergency mirror file outside the database
//!
//! On load, the first tier holding a readable envelope wins.
//! After each save the envelope is also uploaded through a
//! [`CloudSync`](sync/trait.CloudSync.html) implementation, if one is linked.
//! The `vault-keeper-rest` crate provides one for PostgREST-style HTTP tables.
//!
//! ```no_run
//! use vault_keeper::{config::VaultConfig, error::Error, vault::Vault};
//! use serde_json::json;
//! # async fn example() -> Result<(), Error> {
//! let vault = Vault::connect(&VaultConfig::from_env()?, "correct horse", None).await?;
//! vault.save_record(&json!({"accounts": []})).await?;
//! let record: Option<serde_json::Value> = vault.load_record().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Implementation notes
//!
//! Crypto algorithms used are implemented by other packages, notably
//! [RustCrypto](https://github.com/rustcrypto/), a pure-rust implemenation.
//!
//! Key derivation runs 200,000 PBKDF2 rounds and takes a noticeable fraction
//! of a second; the async codec functions move it onto tokio's blocking pool.

pub mod ciphers;
pub mod codec;
pub mod config;
pub mod error;
pub mod kdf;
pub mod rand;
pub mod store;
pub mod sync;
pub mod util;
pub mod vault;

pub use codec::{Envelope, EnvelopeVersion};
pub use vault::Vault;
