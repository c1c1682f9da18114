//! Encryption ciphers

mod aesgcm;
pub use aesgcm::aesgcm256;
