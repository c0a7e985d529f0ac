use std::sync::Arc;

use super::{
    config::Config,
    database::{Store, init_redis},
    error::StoreError,
};

pub struct State {
    pub config: Config,
    pub store: Arc<dyn Store>,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>, StoreError> {
        let store = init_redis(&config.redis_url, &config.namespace).await?;
        store.ping().await?;

        Ok(Self::with_store(config, Arc::new(store)))
    }

    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        Arc::new(Self { config, store })
    }
}
