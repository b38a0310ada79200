//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect the counter store selected by configuration
//! - Build the admission pipeline and HTTP server on top of it
//! - Start the metrics exporter when enabled
//! - Bind the listener last, so traffic only arrives once everything is ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - One store handle per process, shared by both limiters
//! - The store is closed after the server has drained; closing also stops
//!   the memory backend's sweeper

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use super::shutdown::Shutdown;
use crate::admission::AdmissionPipeline;
use crate::config::{GateConfig, StoreBackend, StoreConfig};
use crate::error::{GateError, Result};
use crate::http::{routes::default_routes, GateServer};
use crate::observability::metrics;
use crate::store::{CounterStore, MemoryStore, RedisStore};

/// Open the counter store selected by `config.backend`.
pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn CounterStore>> {
    let store: Arc<dyn CounterStore> = match config.backend {
        StoreBackend::Redis => Arc::new(RedisStore::connect(config).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory counter store; limits are per instance");
            memory_store(config)
        }
    };
    Ok(store)
}

fn memory_store(config: &StoreConfig) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.spawn_sweeper(config.sweep_interval());
    store
}

/// A gate with every subsystem initialized and its listener bound.
pub struct Gate {
    server: GateServer,
    store: Arc<dyn CounterStore>,
    listener: TcpListener,
}

impl Gate {
    /// Initialize with the built-in routes.
    pub async fn bootstrap(config: &GateConfig) -> Result<Self> {
        let store = connect_store(&config.store).await?;
        Self::assemble(config, store, default_routes()).await
    }

    /// Initialize on an existing store with application routes.
    pub async fn assemble(config: &GateConfig, store: Arc<dyn CounterStore>, routes: Router) -> Result<Self> {
        if config.observability.metrics_enabled {
            metrics::init_metrics(parse_addr(&config.observability.metrics_address)?)?;
        }

        let pipeline = Arc::new(AdmissionPipeline::from_config(store.clone(), config));
        let server = GateServer::with_routes(config, pipeline, routes);

        let listener = TcpListener::bind(parse_addr(&config.listener.bind_address)?).await?;
        tracing::info!(
            address = %listener.local_addr()?,
            store = store.backend_name(),
            global_points = config.global_limit.points,
            sensitive_scope = %config.sensitive_limit.scope,
            "Gate initialized"
        );

        Ok(Self { server, store, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` is triggered, then close the store.
    pub async fn run(self, shutdown: &Shutdown) -> Result<()> {
        let served = self.server.run(self.listener, shutdown.notified()).await;

        if let Err(e) = self.store.close().await {
            tracing::warn!(error = %e, "Counter store did not close cleanly");
        }
        served?;

        tracing::info!("Shutdown complete");
        Ok(())
    }
}

fn parse_addr(address: &str) -> Result<SocketAddr> {
    address.parse().map_err(|source| GateError::Address {
        address: address.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn memory_config() -> GateConfig {
        let mut config = GateConfig::default();
        config.store.backend = StoreBackend::Memory;
        config.listener.bind_address = "127.0.0.1:0".to_string();
        config
    }

    #[tokio::test]
    async fn test_bootstrap_with_memory_store() {
        let gate = Gate::bootstrap(&memory_config()).await.unwrap();
        assert_eq!(gate.store.backend_name(), "memory");
        assert_ne!(gate.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_and_closes_store() {
        let store = Arc::new(MemoryStore::new());
        let gate = Gate::assemble(&memory_config(), store.clone(), default_routes())
            .await
            .unwrap();

        let shutdown = Arc::new(Shutdown::new());
        let task = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { gate.run(&shutdown).await })
        };
        while shutdown.receiver_count() == 0 {
            tokio::task::yield_now().await;
        }
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(store.ping().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_is_swept() {
        let config = memory_config();
        let store = memory_store(&config.store);

        store.increment("middleware:10.0.0.1", Duration::from_secs(1)).await.unwrap();
        store.increment("middleware:10.0.0.2", Duration::from_secs(1)).await.unwrap();
        assert_eq!(store.entry_count(), 2);

        tokio::time::sleep(config.store.sweep_interval() + Duration::from_secs(1)).await;
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn test_bad_address_is_reported() {
        let err = parse_addr("not-an-address").unwrap_err();
        assert!(matches!(err, GateError::Address { .. }));
    }
}
