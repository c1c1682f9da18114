//! Crate error handling

pub use std::result::Result;
use thiserror::Error as ThisError;

/// Error enum that rolls-up all error messages in this crate.
///
/// `Authentication` carries no detail: a wrong passphrase and a
/// tampered ciphertext must be indistinguishable to the caller.
#[derive(Debug, ThisError)]
pub enum Error {
    /// malformed envelope, unsupported version, or a record that can't be serialized
    #[error("Validation error: {0}")]
    Validation(String),

    /// AEAD tag verification failed
    #[error("Cannot unlock vault: invalid passphrase or corrupted data")]
    Authentication,

    /// authenticated payload could not be decompressed or parsed
    #[error("Data corruption: {0}")]
    DataCorruption(String),

    /// local store could not be opened, or a transaction failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// cloud collaborator unreachable, unauthorized, or returned an unexpected shape
    #[error("Cloud sync error: {0}")]
    Sync(String),

    /// a required crypto or runtime capability is unavailable
    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Error {
        Error::Storage(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Storage(e.to_string())
    }
}

impl From<getrandom::Error> for Error {
    fn from(_: getrandom::Error) -> Error {
        Error::Environment(String::from("OS random generator unavailable"))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Error {
        Error::Validation(format!("invalid base64 field: {}", e))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Error {
        Error::Environment(format!("blocking worker failed: {}", e))
    }
}

/// Stored or received JSON that doesn't parse. Callers that parse
/// caller-supplied input map serde errors to `Validation` themselves.
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::DataCorruption(format!("unreadable json: {}", e))
    }
}

impl From<strum::ParseError> for Error {
    fn from(e: strum::ParseError) -> Error {
        Error::Validation(format!("unrecognized value: {}", e))
    }
}
