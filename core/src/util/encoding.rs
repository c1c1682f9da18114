//! base64 transport encoding for envelope fields

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Types convertible to a standard base64 string (with padding)
pub trait ToBase64 {
    fn to_base64(&self) -> String;
}

/// Base64-encoded string that can be decoded into Vector
pub trait FromBase64 {
    fn from_base64(&self) -> Result<Vec<u8>, Error>;
}

impl<T: AsRef<[u8]> + ?Sized> ToBase64 for T {
    fn to_base64(&self) -> String {
        STANDARD.encode(self.as_ref())
    }
}

impl FromBase64 for str {
    fn from_base64(&self) -> Result<Vec<u8>, Error> {
        Ok(STANDARD.decode(self.trim())?)
    }
}

impl FromBase64 for String {
    fn from_base64(&self) -> Result<Vec<u8>, Error> {
        self.as_str().from_base64()
    }
}
