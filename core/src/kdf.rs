//! Passphrase key derivation

use crate::{
    ciphers::aesgcm256::{AesGcm256, KEYBYTES},
    error::{Error, Result},
};
use hmac::Hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Number of rounds for password generation.
/// More rounds takes longer for an attacker to brute-force guess any password.
/// ROUNDS may not change after deployment to ensure binary compatibility of vaults,
/// unless an upgrade/reencryption option is provided. It is not recorded in the envelope.
pub const ROUNDS: u32 = 200_000;

/// Number of bytes of salt stored with each envelope
pub const SALTBYTES: usize = 16;

/// Create a cipher from the kdf-derived key.
/// Uses PBKDF2+HMAC+SHA256+SALT (from [RustCrypto](https://github.com/RustCrypto/password-hashes))
///
/// The derived key never leaves this function: it initializes the cipher and is zeroized.
/// Callers derive again for every salt; nothing is cached.
pub fn key_cipher_from_pass(passphrase: &str, salt: &[u8]) -> Result<AesGcm256, Error> {
    let derived_key = key_from_pass(passphrase, salt)?;
    AesGcm256::init_from(&derived_key[..])
}

/// Generate key from passphrase.
/// This function is not public because keys should only be used through a cipher,
/// to reduce risk of accidental logging or exposure.
fn key_from_pass(passphrase: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEYBYTES]>, Error> {
    if salt.is_empty() {
        return Err(Error::Validation("salt may not be empty".to_string()));
    }
    let mut derived = Zeroizing::new([0u8; KEYBYTES]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(passphrase.as_bytes(), salt, ROUNDS, &mut derived[..])
        .map_err(|_| Error::Environment("pbkdf2 output length rejected".to_string()))?;
    Ok(derived)
}
