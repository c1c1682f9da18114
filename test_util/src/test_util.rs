//! test utilities

use bytes::BytesMut;
use random_fast_rng::{FastRng, Random};
use serde_json::{json, Value};

/// compare two arrays for equality
/// Returns true if arrays have the same length and corresponding elements are "equal"
/// ```
/// use vault_keeper_test_util::arrays_eq;
/// let first: Vec<u8> = vec![1,2,3,4,5];
/// let mut second: Vec<u8> = Vec::new();
/// second.extend_from_slice(&first);
/// assert!(arrays_eq(&first, &second));
/// ```
pub fn arrays_eq<T: PartialEq>(a1: &[T], a2: &[T]) -> bool {
    a1.len() == a2.len() && a1.iter().zip(a2.iter()).all(|(a, b)| a == b)
}

/// Create a BytesMut buffer and fill with random data.
/// This does not generate cryptographically secure RNGs. Do NOT use this to generate keys,
/// except for unit tests.
/// ```
/// use vault_keeper_test_util::random_bytes;
/// const BUF_LEN:usize = 128;
/// let data = random_bytes(BUF_LEN);
/// assert!(data.len() == BUF_LEN);
/// ```
pub fn random_bytes(len: usize) -> BytesMut {
    let mut buf = zeroed_bytes(len);
    FastRng::new().fill_bytes(buf.as_mut());
    buf
}

/// Fill buffer with random (English) word-like text
/// ```
/// use vault_keeper_test_util::{random_fill_text, zeroed_bytes};
/// use random_fast_rng::FastRng;
/// const BUF_LEN:usize = 256;
/// let mut rng = FastRng::new();
/// let mut buf = zeroed_bytes(BUF_LEN);
/// random_fill_text(&mut rng, &mut buf);
/// ```
pub fn random_fill_text(rng: &mut FastRng, buf: &mut [u8]) {
    // this string must be 32 chars (or longer) for bitmask below to work
    const ENGLISH_TEXT_CHARS: &[u8] = b"abcdefghijklmnoprstuvwxyz   etao";
    for b in buf.iter_mut() {
        *b = ENGLISH_TEXT_CHARS[rng.get_u8() as usize & 31]
    }
}

/// Create a zero-filled buffer of specific size
/// ```
/// use vault_keeper_test_util::zeroed_bytes;
/// assert_eq!(zeroed_bytes(3).len(), 3);
/// ```
pub fn zeroed_bytes(sz: usize) -> BytesMut {
    BytesMut::zeroed(sz)
}

/// Creates an empty temporary directory, removed when the returned value is dropped.
/// ```
/// use vault_keeper_test_util::temp_dir;
/// let dir = temp_dir().expect("tmpdir");
/// assert!(dir.as_path().is_dir());
/// ```
pub fn temp_dir() -> Result<mktemp::Temp, std::io::Error> {
    mktemp::Temp::new_dir()
}

/// A small vault record with `n` accounts
/// ```
/// use vault_keeper_test_util::sample_vault;
/// assert_eq!(sample_vault(3)["accounts"].as_array().unwrap().len(), 3);
/// ```
pub fn sample_vault(n: usize) -> Value {
    let accounts: Vec<Value> = (0..n)
        .map(|i| json!({ "name": format!("Account {}", i), "balance": (i as i64) * 100 }))
        .collect();
    json!({ "accounts": accounts, "settings": { "currency": "EUR" } })
}
