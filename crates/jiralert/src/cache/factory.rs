use crate::cache::{KeyValueStore, SqliteStore, StoreConfig};
use std::sync::Arc;

/// Open the store and apply its schema.
pub async fn create_store(config: &StoreConfig) -> crate::Result<Arc<dyn KeyValueStore>> {
    config.validate().map_err(crate::Error::Config)?;

    let path = config
        .sqlite_path
        .to_str()
        .ok_or_else(|| crate::Error::Config("SQLite path is not valid UTF-8".into()))?;
    let store = SqliteStore::new(path, config.max_connections).await?;
    store.init().await?;
    Ok(Arc::new(store))
}
