use super::{decrypt, encrypt, encrypt_as, seal, test_key, Envelope, EnvelopeVersion};
use crate::error::{Error, Result};
use serde_json::{json, Value};
use std::collections::HashMap;

fn sample() -> Value {
    json!({"accounts": [{"name": "Test", "balance": 100}]})
}

/// rewrite one field of the envelope's wire form
fn edit(envelope: &Envelope, field: &str, value: Value) -> Envelope {
    let mut wire: Value = serde_json::from_str(&envelope.to_json()).expect("json");
    wire[field] = value;
    Envelope::from_json(&wire.to_string()).expect("reparse")
}

#[tokio::test]
async fn encrypt_decrypt_record() -> Result<(), Error> {
    let envelope = encrypt(&sample(), "pw123").await?;
    assert_eq!(envelope.version(), 2);
    assert!(envelope.is_compressed());

    let back: Value = decrypt(&envelope, "pw123").await?;
    assert_eq!(back, sample());
    Ok(())
}

#[tokio::test]
async fn wrong_passphrase() -> Result<(), Error> {
    let envelope = encrypt(&sample(), "pw123").await?;
    let res = decrypt::<Value>(&envelope, "wrong").await;
    assert!(matches!(res, Err(Error::Authentication)), "{:?}", res);
    Ok(())
}

#[tokio::test]
async fn tampered_ciphertext() -> Result<(), Error> {
    let envelope = encrypt(&sample(), "pw123").await?;
    let mut data = envelope.data().to_string().into_bytes();
    // swap the first base64 digit for a different valid one
    data[0] = if data[0] == b'A' { b'B' } else { b'A' };
    let tampered = edit(&envelope, "data", Value::String(String::from_utf8(data).unwrap()));

    assert!(matches!(
        decrypt::<Value>(&tampered, "pw123").await,
        Err(Error::Authentication)
    ));
    Ok(())
}

#[tokio::test]
async fn tampered_salt_or_iv() -> Result<(), Error> {
    let envelope = encrypt(&sample(), "pw123").await?;
    let other = encrypt(&sample(), "pw123").await?;

    let mixed_salt = edit(&envelope, "salt", Value::String(other.salt().to_string()));
    assert!(matches!(
        decrypt::<Value>(&mixed_salt, "pw123").await,
        Err(Error::Authentication)
    ));
    let mixed_iv = edit(&envelope, "iv", Value::String(other.iv().to_string()));
    assert!(matches!(
        decrypt::<Value>(&mixed_iv, "pw123").await,
        Err(Error::Authentication)
    ));
    Ok(())
}

#[tokio::test]
async fn fresh_salt_and_iv() -> Result<(), Error> {
    let a = encrypt(&sample(), "pw123").await?;
    let b = encrypt(&sample(), "pw123").await?;
    assert_ne!(a.salt(), b.salt());
    assert_ne!(a.iv(), b.iv());
    assert_ne!(a.data(), b.data());
    Ok(())
}

#[tokio::test]
async fn reads_uncompressed_v1() -> Result<(), Error> {
    let envelope = encrypt_as(&sample(), "pw123", EnvelopeVersion::V1).await?;
    assert_eq!(envelope.version(), 1);
    assert!(!envelope.is_compressed());
    let back: Value = decrypt(&envelope, "pw123").await?;
    assert_eq!(back, sample());

    // a stray compressed flag on v1 is ignored
    let flagged = edit(&envelope, "compressed", Value::Bool(true));
    let back: Value = decrypt(&flagged, "pw123").await?;
    assert_eq!(back, sample());
    Ok(())
}

#[tokio::test]
async fn typed_records() -> Result<(), Error> {
    let mut balances = HashMap::new();
    balances.insert("checking".to_string(), 1250i64);
    balances.insert("savings".to_string(), -3i64);

    let envelope = encrypt(&balances, "typed").await?;
    let back: HashMap<String, i64> = decrypt(&envelope, "typed").await?;
    assert_eq!(back, balances);
    Ok(())
}

#[tokio::test]
async fn unicode_and_empty_passphrase() -> Result<(), Error> {
    let record = json!({"note": "café ✓"});
    let envelope = encrypt(&record, "").await?;
    let back: Value = decrypt(&envelope, "").await?;
    assert_eq!(back, record);
    assert!(decrypt::<Value>(&envelope, " ").await.is_err());
    Ok(())
}

#[tokio::test]
async fn unserializable_record() {
    // json object keys must be strings
    let mut map = HashMap::new();
    map.insert((1u8, 2u8), 3u8);
    assert!(matches!(
        encrypt(&map, "pw").await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn invalid_envelopes() -> Result<(), Error> {
    let envelope = encrypt(&sample(), "pw123").await?;

    let future = edit(&envelope, "version", json!(3));
    assert!(matches!(decrypt::<Value>(&future, "pw123").await, Err(Error::Validation(_))));

    let no_salt = edit(&envelope, "salt", json!(""));
    assert!(matches!(decrypt::<Value>(&no_salt, "pw123").await, Err(Error::Validation(_))));

    let bad_b64 = edit(&envelope, "data", json!("***"));
    assert!(matches!(decrypt::<Value>(&bad_b64, "pw123").await, Err(Error::Validation(_))));

    let short_iv = edit(&envelope, "iv", json!("AAAA"));
    assert!(matches!(decrypt::<Value>(&short_iv, "pw123").await, Err(Error::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn bad_payload_after_auth() -> Result<(), Error> {
    // authenticated, but not json
    let envelope = seal(b"not json", "pw", EnvelopeVersion::V1)?;
    assert!(matches!(
        decrypt::<Value>(&envelope, "pw").await,
        Err(Error::DataCorruption(_))
    ));

    // authenticated, but claims compression it doesn't have
    let plain = seal(br#"{"a":1}"#, "pw", EnvelopeVersion::V1)?;
    let relabeled = edit(&edit(&plain, "version", json!(2)), "compressed", json!(true));
    assert!(matches!(
        decrypt::<Value>(&relabeled, "pw").await,
        Err(Error::DataCorruption(_))
    ));
    Ok(())
}

#[tokio::test]
async fn key_self_test() -> Result<(), Error> {
    assert!(test_key("anything").await?);
    assert!(matches!(test_key("").await, Err(Error::Validation(_))));
    Ok(())
}
