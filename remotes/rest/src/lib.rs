//! CloudSync for a PostgREST-compatible HTTP table
//!
//! One row per identity, in a table shaped like:
//! ```sql
//! create table vaults (
//!   identity text primary key,
//!   encrypted_data jsonb not null,
//!   updated_at timestamptz not null,
//!   device text
//! );
//! ```
//!
//! Configuration is read from the environment by [`RestOptions::from_env`]:
//! - `VAULT_CLOUD_URL` base url of the gateway, for example `https://project.example.co`
//! - `VAULT_CLOUD_KEY` api key, sent as `apikey` and as a bearer token
//! - `VAULT_CLOUD_TABLE` table name (default `vaults`)
//! - `VAULT_CLOUD_TIMEOUT_SECS` per-request timeout (default 10)
//! - `VAULT_DEVICE` device tag stored with each upload (default `desktop`)
//!
//! The http client is built on first use, so constructing a `RestCloud`
//! never touches the network.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;
use vault_keeper::{
    error::{Error, Result},
    sync::{CloudSync, Identity, RemoteCopy},
    util::{getenv, getenv_default},
    Envelope,
};

mod rest_client;
use rest_client::{lookup, new_client, probe, table_url, upsert, UpsertRow};


pub const URL_VAR: &str = "VAULT_CLOUD_URL";
pub const KEY_VAR: &str = "VAULT_CLOUD_KEY";
pub const TABLE_VAR: &str = "VAULT_CLOUD_TABLE";
pub const TIMEOUT_VAR: &str = "VAULT_CLOUD_TIMEOUT_SECS";
pub const DEVICE_VAR: &str = "VAULT_DEVICE";

const DEFAULT_TABLE: &str = "vaults";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_DEVICE: &str = "desktop";

/// Options for initializing RestCloud
#[derive(Clone)]
pub struct RestOptions {
    /// base url of the gateway, without the `/rest/v1` path
    pub base_url: String,
    /// api key; sent with every request
    pub api_key: String,
    pub table: String,
    /// deadline for each request
    pub timeout: Duration,
    /// device tag stored with uploads
    pub device: String,
}

/// Implementation of Debug that doesn't print the api key
impl std::fmt::Debug for RestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestOptions")
            .field("base_url", &self.base_url)
            .field("table", &self.table)
            .field("timeout", &self.timeout)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl RestOptions {
    pub fn defaults() -> Self {
        RestOptions {
            base_url: String::new(),
            api_key: String::new(),
            table: DEFAULT_TABLE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            device: DEFAULT_DEVICE.to_string(),
        }
    }

    /// Reads options from the environment.
    /// `VAULT_CLOUD_URL` and `VAULT_CLOUD_KEY` are required.
    pub fn from_env() -> Result<Self, Error> {
        let timeout = getenv_default(TIMEOUT_VAR, &DEFAULT_TIMEOUT_SECS.to_string());
        let timeout: u64 = timeout.trim().parse().map_err(|_| {
            Error::Validation(format!("{} must be a number of seconds", TIMEOUT_VAR))
        })?;
        Ok(RestOptions {
            base_url: getenv(URL_VAR)?,
            api_key: getenv(KEY_VAR)?,
            table: getenv_default(TABLE_VAR, DEFAULT_TABLE),
            timeout: Duration::from_secs(timeout),
            device: getenv_default(DEVICE_VAR, DEFAULT_DEVICE),
        })
    }
}

/// Connection state, created once on first use
struct RestContext {
    client: reqwest::Client,
}

/// CloudSync over a PostgREST table
pub struct RestCloud {
    opts: RestOptions,
    table: Url,
    context: OnceCell<RestContext>,
}

impl std::fmt::Debug for RestCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestCloud")
            .field("table", &self.table.as_str())
            .field("connected", &self.context.initialized())
            .finish()
    }
}

impl RestCloud {
    /// Validates the options. Does not connect.
    pub fn new(opts: RestOptions) -> Result<Self, Error> {
        if opts.api_key.is_empty() {
            return Err(Error::Validation("cloud api key is empty".to_string()));
        }
        let table = table_url(&opts.base_url, &opts.table)?;
        Ok(RestCloud {
            opts,
            table,
            context: OnceCell::new(),
        })
    }

    /// Constructs a RestCloud from environment options
    pub fn from_env() -> Result<Self, Error> {
        Self::new(RestOptions::from_env()?)
    }

    /// the table endpoint
    pub fn table_url(&self) -> &Url {
        &self.table
    }

    async fn context(&self) -> Result<&RestContext, Error> {
        self.context
            .get_or_try_init(|| async {
                debug!(table = %self.table, "initializing cloud client");
                new_client(&self.opts.api_key, self.opts.timeout).map(|client| RestContext { client })
            })
            .await
    }

    /// Returns true if the table can be queried with these credentials
    pub async fn test_connection(&self) -> bool {
        let res = match self.context().await {
            Ok(ctx) => probe(&ctx.client, &self.table).await,
            Err(e) => Err(e),
        };
        match res {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "cloud connection test failed");
                false
            }
        }
    }
}

#[async_trait]
impl CloudSync for RestCloud {
    async fn upload(&self, envelope: &Envelope, identity: &Identity) -> Result<(), Error> {
        let ctx = self.context().await?;
        let row = UpsertRow {
            identity: identity.as_str(),
            encrypted_data: envelope,
            updated_at: Utc::now(),
            device: &self.opts.device,
        };
        upsert(&ctx.client, &self.table, &row).await
    }

    async fn download(&self, identity: &Identity) -> Result<Option<RemoteCopy>, Error> {
        let ctx = self.context().await?;
        lookup(&ctx.client, &self.table, identity).await
    }
}
