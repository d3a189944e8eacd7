//! Local lookup cache: issue label -> last known Jira issue id.
//!
//! The cache is advisory. Jira stays the source of truth; every hit is
//! confirmed remotely by the reconciliation engine, so storage failures here
//! only cost an extra search.

mod config;
mod factory;
mod sqlite;

pub use config::{StoreConfig, DB_FILE_NAME};
pub use factory::create_store;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_BUCKET: &str = "JIRA";

/// Bucketed string key-value storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    // Initialize database schema
    async fn init(&self) -> crate::Result<()>;

    async fn create_bucket_if_not_exists(&self, bucket: &str) -> crate::Result<()>;
    async fn get(&self, bucket: &str, key: &str) -> crate::Result<Option<String>>;
    async fn put(&self, bucket: &str, key: &str, value: &str) -> crate::Result<()>;
}

/// Fail-open view over a [`KeyValueStore`] bucket.
#[derive(Clone)]
pub struct LookupCache {
    store: Arc<dyn KeyValueStore>,
    bucket: String,
}

impl LookupCache {
    /// Use `bucket` in `store`, creating it if absent.
    pub async fn open(store: Arc<dyn KeyValueStore>, bucket: &str) -> crate::Result<Self> {
        store.create_bucket_if_not_exists(bucket).await?;
        Ok(Self {
            store,
            bucket: bucket.to_string(),
        })
    }

    /// Cached issue id for `issue_label`. Storage errors read as a miss.
    pub async fn get(&self, issue_label: &str) -> Option<String> {
        match self.store.get(&self.bucket, issue_label).await {
            Ok(Some(id)) => {
                debug!("Local ID for {} is {}", issue_label, id);
                Some(id)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Lookup cache read failed for {}: {}", issue_label, e);
                None
            }
        }
    }

    /// Remember `issue_id` for `issue_label`. Failures are logged only.
    pub async fn put(&self, issue_label: &str, issue_id: &str) {
        if let Err(e) = self.store.put(&self.bucket, issue_label, issue_id).await {
            warn!("Lookup cache write failed for {}: {}", issue_label, e);
        }
    }
}
