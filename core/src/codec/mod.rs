//! Vault codec: record <-> encrypted envelope
//!
//! `encrypt` serializes a record to JSON, compresses it, derives a key from
//! the passphrase with a fresh salt, and seals it with AES-256-GCM under a
//! fresh nonce. `decrypt` reverses that and accepts both envelope versions.
//!
//! Key derivation is slow; the blocking work runs on
//! tokio's blocking pool.

use crate::{
    ciphers::aesgcm256::NONCEBYTES,
    error::{Error, Result},
    kdf::{key_cipher_from_pass, SALTBYTES},
    rand,
    util::{compress, decompress, FromBase64},
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

mod envelope;
pub use envelope::{Envelope, EnvelopeVersion};

#[cfg(test)]
mod test_codec;

/// Encrypts a record into a current-version envelope
pub async fn encrypt<T>(record: &T, passphrase: &str) -> Result<Envelope, Error>
where
    T: Serialize + ?Sized,
{
    encrypt_as(record, passphrase, EnvelopeVersion::CURRENT).await
}

/// Encrypts a record into an envelope of the given version.
/// V1 skips compression; it exists for compatibility with older readers.
pub async fn encrypt_as<T>(
    record: &T,
    passphrase: &str,
    version: EnvelopeVersion,
) -> Result<Envelope, Error>
where
    T: Serialize + ?Sized,
{
    let plaintext = Zeroizing::new(
        serde_json::to_vec(record)
            .map_err(|e| Error::Validation(format!("record is not serializable: {}", e)))?,
    );
    let passphrase = Zeroizing::new(passphrase.to_string());
    tokio::task::spawn_blocking(move || seal(&plaintext, &passphrase, version)).await?
}

/// Decrypts an envelope back into a record.
pub async fn decrypt<T>(envelope: &Envelope, passphrase: &str) -> Result<T, Error>
where
    T: DeserializeOwned,
{
    envelope.validate()?;
    let salt = envelope.salt().from_base64()?;
    let iv = envelope.iv().from_base64()?;
    if iv.len() != NONCEBYTES {
        return Err(Error::Validation(format!(
            "iv must be {} bytes, got {}",
            NONCEBYTES,
            iv.len()
        )));
    }
    if salt.is_empty() {
        return Err(Error::Validation("salt may not be empty".to_string()));
    }
    let ciphertext = envelope.data().from_base64()?;
    let inflate = envelope.needs_decompress();
    let passphrase = Zeroizing::new(passphrase.to_string());

    let plaintext = tokio::task::spawn_blocking(move || {
        open(&ciphertext, &passphrase, &salt, &iv, inflate)
    })
    .await??;

    serde_json::from_slice(&plaintext)
        .map_err(|e| Error::DataCorruption(format!("decrypted record is not valid JSON: {}", e)))
}

/// Checks that the crypto pipeline works end to end on this host,
/// by encrypting and decrypting a fixed sentinel with the passphrase.
pub async fn test_key(passphrase: &str) -> Result<bool, Error> {
    if passphrase.is_empty() {
        return Err(Error::Validation("passphrase may not be empty".to_string()));
    }
    let sentinel = serde_json::json!({ "test": true });
    let roundtrip = async {
        let envelope = encrypt(&sentinel, passphrase).await?;
        decrypt::<serde_json::Value>(&envelope, passphrase).await
    };
    let back = roundtrip.await.map_err(|e| match e {
        Error::Environment(_) => e,
        other => Error::Environment(format!("crypto self-test failed: {}", other)),
    })?;
    if back != sentinel {
        return Err(Error::Environment(
            "crypto self-test returned a different value".to_string(),
        ));
    }
    Ok(true)
}

fn seal(plaintext: &[u8], passphrase: &str, version: EnvelopeVersion) -> Result<Envelope, Error> {
    let compressed;
    let payload: &[u8] = match version {
        EnvelopeVersion::V2 => {
            compressed = compress(plaintext)
                .map_err(|e| Error::Environment(format!("compression failed: {}", e)))?;
            &compressed
        }
        EnvelopeVersion::V1 => plaintext,
    };
    let salt: [u8; SALTBYTES] = rand::random_array()?;
    let iv: [u8; NONCEBYTES] = rand::random_array()?;
    let cipher = key_cipher_from_pass(passphrase, &salt)?;
    let ciphertext = cipher.seal(&iv, payload)?;
    debug!(
        plain = plaintext.len(),
        sealed = ciphertext.len(),
        %version,
        "sealed envelope"
    );
    Ok(Envelope::new(version, &salt, &iv, &ciphertext))
}

fn open(
    ciphertext: &[u8],
    passphrase: &str,
    salt: &[u8],
    iv: &[u8],
    inflate: bool,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let cipher = key_cipher_from_pass(passphrase, salt)?;
    let payload = cipher.open(iv, ciphertext)?;
    if !inflate {
        return Ok(payload);
    }
    let plain = decompress(&payload)
        .map_err(|e| Error::DataCorruption(format!("decompression failed: {}", e)))?;
    debug!(sealed = ciphertext.len(), plain = plain.len(), "opened envelope");
    Ok(Zeroizing::new(plain.to_vec()))
}
