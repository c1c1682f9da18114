/// Cipher implementation of AES-GCM (Galois/Counter Mode) with 256-bit keys
pub mod aesgcm256 {

    // `RUSTFLAGS="-Ctarget-cpu=sandybridge -Ctarget-feature=+aes,+sse2,+sse4.1,+ssse3"`
    use crate::error::{Error, Result};
    use aes_gcm::{
        aead::{consts::U12, generic_array::GenericArray, Aead, KeyInit},
        Aes256Gcm,
    };
    use std::fmt;
    use zeroize::Zeroizing;

    /// Number of bytes in encryption key for AES_GCM (256 bits = 32 bytes)
    pub const KEYBYTES: usize = 32;
    /// Number of bytes in nonce (96 bites = 12 bytes)
    pub const NONCEBYTES: usize = 12;
    /// Number of bytes in auth integrity tag
    pub const TAGBYTES: usize = 16;

    type PNonce = GenericArray<u8, U12>;

    /// Cipher implementation of AES-GCM (Galois/Counter Mode) with 256-bit keys
    /// with optional architecture-specific hardware acceleration
    /// encryption implemented by [RustCrypto](htttps://github.com/RustCrypto/AEADs)
    ///
    /// The key is only reachable through `seal` and `open`; there is no accessor.
    pub struct AesGcm256 {
        aesgcm: Aes256Gcm,
    }

    /// Implementation of Debug that doesn't print key to prevent accidental leaks via logging
    impl fmt::Debug for AesGcm256 {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("AesGcm256").finish_non_exhaustive()
        }
    }

    impl AesGcm256 {
        /// Initialize cipher with provided key.
        /// key length must be exactly KEYBYTES.
        pub(crate) fn init_from(key: &[u8]) -> Result<Self, Error> {
            if key.len() != KEYBYTES {
                return Err(Error::Environment(format!(
                    "aes-gcm key must be {} bytes",
                    KEYBYTES
                )));
            }
            let aesgcm = Aes256Gcm::new_from_slice(key)
                .map_err(|_| Error::Environment("aes-gcm key init failed".to_string()))?;
            Ok(Self { aesgcm })
        }

        /// Encrypts the slice. Return value contains the ciphertext
        /// with the 16-byte authentication tag appended.
        pub fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
            self.aesgcm
                .encrypt(nonce_from(nonce)?, plaintext)
                .map_err(|_| Error::Environment("aes-gcm encryption failed".to_string()))
        }

        /// Decrypts ciphertext+tag. Any tag mismatch is reported as
        /// `Error::Authentication`, whatever the cause.
        pub fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
            let plaintext = self
                .aesgcm
                .decrypt(nonce_from(nonce)?, ciphertext)
                .map_err(|_| Error::Authentication)?;
            Ok(Zeroizing::new(plaintext))
        }
    }

    fn nonce_from(nonce: &[u8]) -> Result<&PNonce, Error> {
        if nonce.len() != NONCEBYTES {
            return Err(Error::Validation(format!(
                "iv must be {} bytes, got {}",
                NONCEBYTES,
                nonce.len()
            )));
        }
        Ok(GenericArray::from_slice(nonce))
    }
}
