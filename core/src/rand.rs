//! CSRNG based on platform (OS) CSRNG.
//!
//! Used for salt and nonce generation. Every envelope gets fresh values,
//! so nothing here is seeded or cached.
//!
use crate::error::{Error, Result};

/// Fills `buf` from the OS generator (via `getrandom`)
pub fn fill_buf(buf: &mut [u8]) -> Result<(), Error> {
    getrandom::getrandom(buf)?;
    Ok(())
}

/// Returns an array of N random bytes
pub fn random_array<const N: usize>() -> Result<[u8; N], Error> {
    let mut buf = [0u8; N];
    fill_buf(&mut buf)?;
    Ok(buf)
}
