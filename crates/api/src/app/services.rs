use std::sync::Arc;

use anyhow::Context;

use stockledger_infra::{
    AppConfig, InMemoryStockStore, MutationEngine, PostgresStockStore, QueryLayer, StockStore,
    StorageConfig,
};

/// Store handle shared by the write and read paths.
pub type SharedStore = Arc<dyn StockStore>;

/// Everything request handlers need, built once at startup.
pub struct AppServices {
    engine: MutationEngine<SharedStore>,
    queries: QueryLayer<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore) -> Self {
        Self {
            engine: MutationEngine::new(store.clone()),
            queries: QueryLayer::new(store),
        }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStockStore::new()))
    }

    pub fn engine(&self) -> &MutationEngine<SharedStore> {
        &self.engine
    }

    pub fn queries(&self) -> &QueryLayer<SharedStore> {
        &self.queries
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: SharedStore = match &config.storage {
        StorageConfig::InMemory => {
            tracing::warn!("USE_PERSISTENT_STORES not set; stock data lives in memory only");
            Arc::new(InMemoryStockStore::new())
        }
        StorageConfig::Postgres {
            url,
            max_connections,
        } => {
            let store = PostgresStockStore::connect(url, *max_connections)
                .await
                .context("failed to connect to postgres")?;
            store
                .ensure_schema()
                .await
                .context("failed to prepare postgres schema")?;
            tracing::info!(max_connections, "using postgres stock store");
            Arc::new(store)
        }
    };

    Ok(AppServices::new(store))
}
