// src/util.rs

use crate::error::Error;
use std::time::{SystemTime, UNIX_EPOCH};

/// retrieve environment variable
pub fn getenv(key: &str) -> Result<String, Error> {
    std::env::var(key)
        .map_err(|_| Error::Validation(format!("Undefined environment var: {}", key)))
}

/// retrieve environment variable, with default value
pub fn getenv_default(key: &str, default_val: &str) -> String {
    match std::env::var(key) {
        Ok(v) => v,
        Err(_) => String::from(default_val),
    }
}

/// milliseconds since the unix epoch, from the system clock
pub fn unix_millis() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        // clock set before 1970
        Err(e) => -(e.duration().as_millis() as i64),
    }
}
