use super::{CloudSync, Identity, RemoteCopy};
use crate::{
    codec::Envelope,
    error::{Error, Result},
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-process CloudSync, for tests and offline use
#[derive(Debug)]
pub struct MemoryCloud {
    device: String,
    rows: Mutex<HashMap<Identity, RemoteCopy>>,
}

impl MemoryCloud {
    pub fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
            rows: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the row for an identity, as another device would
    pub async fn put(&self, identity: &Identity, copy: RemoteCopy) {
        self.rows.lock().await.insert(identity.clone(), copy);
    }

    pub async fn get(&self, identity: &Identity) -> Option<RemoteCopy> {
        self.rows.lock().await.get(identity).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl CloudSync for MemoryCloud {
    async fn upload(&self, envelope: &Envelope, identity: &Identity) -> Result<(), Error> {
        let copy = RemoteCopy {
            envelope: envelope.clone(),
            updated_at: Utc::now(),
            device: self.device.clone(),
        };
        self.put(identity, copy).await;
        Ok(())
    }

    async fn download(&self, identity: &Identity) -> Result<Option<RemoteCopy>, Error> {
        Ok(self.get(identity).await)
    }
}
