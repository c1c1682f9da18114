// src/rest_client.rs
// async http client for a PostgREST-style table of vault rows

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;
use vault_keeper::{
    error::{Error, Result},
    sync::{Identity, RemoteCopy},
    Envelope,
};

/// url path of the table api, relative to the base url
const TABLE_PATH: &str = "rest/v1/";
/// PostgREST error code for "no rows" on a single-object request
pub(crate) const NOT_FOUND_CODE: &str = "PGRST116";

/// Row sent on upsert
#[derive(Debug, Serialize)]
pub(crate) struct UpsertRow<'a> {
    pub identity: &'a str,
    pub encrypted_data: &'a Envelope,
    pub updated_at: DateTime<Utc>,
    pub device: &'a str,
}

/// Row returned by lookup
#[derive(Debug, Deserialize)]
pub(crate) struct VaultRow {
    encrypted_data: EncryptedData,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    device: String,
}

/// The envelope column may be stored as a json object or as json text
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EncryptedData {
    Text(String),
    Object(Envelope),
}

/// Error body returned by the server
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl VaultRow {
    fn into_copy(self) -> Result<RemoteCopy, Error> {
        let envelope = match self.encrypted_data {
            EncryptedData::Object(envelope) => envelope,
            EncryptedData::Text(text) => Envelope::from_json(&text)
                .map_err(|e| Error::Sync(format!("remote row holds no envelope: {}", e)))?,
        };
        Ok(RemoteCopy {
            envelope,
            updated_at: self.updated_at,
            device: self.device,
        })
    }
}

/// Create new http client for api requests with the given api key
pub(crate) fn new_client(api_key: &str, timeout: Duration) -> Result<reqwest::Client, Error> {
    let mut headers = reqwest::header::HeaderMap::new();
    let key = http::HeaderValue::from_str(api_key)
        .map_err(|_| Error::Validation("invalid api key string".to_string()))?;
    let bearer = http::HeaderValue::from_str(&format!("Bearer {}", api_key))
        .map_err(|_| Error::Validation("invalid api key string".to_string()))?;
    let _ = headers.insert("apikey", key);
    let _ = headers.insert(http::header::AUTHORIZATION, bearer);

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Environment(format!("http client init failed: {}", e)))
}

/// Returns the table endpoint, `{base}/rest/v1/{table}`
pub(crate) fn table_url(base_url: &str, table: &str) -> Result<Url, Error> {
    if table.is_empty() || !table.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(Error::Validation(format!("invalid table name '{}'", table)));
    }
    let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
        .map_err(|e| Error::Validation(format!("invalid cloud url: {}", e)))?;
    if base.cannot_be_a_base() {
        return Err(Error::Validation(format!("invalid cloud url: {}", base_url)));
    }
    base.join(TABLE_PATH)
        .and_then(|u| u.join(table))
        .map_err(|e| Error::Validation(format!("invalid cloud url: {}", e)))
}

/// Upsert url: conflicts on `identity` replace the row
pub(crate) fn upsert_url(table: &Url) -> Url {
    let mut url = table.clone();
    url.query_pairs_mut().append_pair("on_conflict", "identity");
    url
}

/// Point lookup url for one identity
pub(crate) fn lookup_url(table: &Url, identity: &Identity) -> Url {
    let mut url = table.clone();
    url.query_pairs_mut()
        .append_pair("identity", &format!("eq.{}", identity))
        .append_pair("select", "encrypted_data,updated_at,device");
    url
}

/// Cheapest query the table accepts
pub(crate) fn probe_url(table: &Url) -> Url {
    let mut url = table.clone();
    url.query_pairs_mut()
        .append_pair("select", "identity")
        .append_pair("limit", "1");
    url
}

fn io_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Sync("cloud request timed out".to_string())
    } else {
        Error::Sync(format!("cloud io error: {}", e))
    }
}

fn api_error(status: StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<ApiError>(body)
        .map(|e| e.message)
        .unwrap_or_default();
    Error::Sync(format!("cloud api error {}: {}", status, detail))
}

/// Send upsert request. Returns error if there are any IO errors OR if http status is not 2xx
pub(crate) async fn upsert(
    client: &reqwest::Client,
    table: &Url,
    row: &UpsertRow<'_>,
) -> Result<(), Error> {
    let res = client
        .post(upsert_url(table))
        .header("Prefer", "resolution=merge-duplicates,return=minimal")
        .json(row)
        .send()
        .await
        .map_err(io_error)?;
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(api_error(status, &body));
    }
    debug!(%status, "upserted vault row");
    Ok(())
}

/// Fetch the row for an identity. Ok(None) if there is none.
pub(crate) async fn lookup(
    client: &reqwest::Client,
    table: &Url,
    identity: &Identity,
) -> Result<Option<RemoteCopy>, Error> {
    let res = client
        .get(lookup_url(table, identity))
        .send()
        .await
        .map_err(io_error)?;
    let status = res.status();
    let body = res.text().await.map_err(io_error)?;
    parse_lookup(status, &body)
}

/// Interprets a lookup response
pub(crate) fn parse_lookup(status: StatusCode, body: &str) -> Result<Option<RemoteCopy>, Error> {
    if !status.is_success() {
        if let Ok(err) = serde_json::from_str::<ApiError>(body) {
            if err.code == NOT_FOUND_CODE {
                return Ok(None);
            }
        }
        return Err(api_error(status, body));
    }
    let rows: Vec<VaultRow> = serde_json::from_str(body)
        .map_err(|e| Error::Sync(format!("unexpected lookup response: {}", e)))?;
    match rows.into_iter().next() {
        Some(row) => Ok(Some(row.into_copy()?)),
        None => Ok(None),
    }
}

/// Returns Ok if the table answers a trivial query
pub(crate) async fn probe(client: &reqwest::Client, table: &Url) -> Result<(), Error> {
    let res = client.get(probe_url(table)).send().await.map_err(io_error)?;
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(api_error(status, &body));
    }
    Ok(())
}
