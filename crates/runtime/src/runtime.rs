//! High-level runtime orchestrator.
//!
//! The runtime wires the game service, session store, event bus, energy
//! scheduler and orchestrators together, and exposes a builder-based API
//! for clients to drive them.

use std::sync::Arc;

use tokio::sync::broadcast;

use client_api_core::GameApi;

use crate::api::{DecisionProvider, Result, RuntimeError, RuntimeHandle};
use crate::config::RuntimeConfig;
use crate::context::ApiContext;
use crate::energy::EnergyScheduler;
use crate::events::{Event, EventBus, Topic};
use crate::orchestrator::{ClaimOrchestrator, RunOrchestrator};
use crate::repository::{FileHistory, HistoryRepository, InMemoryHistory};
use crate::store::SessionStore;
use crate::token::ActionTokenTracker;

/// Main runtime for one account session
///
/// Design: Runtime owns the background tasks and stops them on shutdown.
/// [`RuntimeHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    handle: RuntimeHandle,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    ///
    /// The handle can be shared across clients and async tasks.
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.handle.subscribe(topic)
    }

    /// Stop auto-play and the energy timer, and wait for both to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    api: Option<Arc<dyn GameApi>>,
    address: Option<String>,
    provider: Option<Arc<dyn DecisionProvider>>,
    history: Option<Arc<dyn HistoryRepository>>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            api: None,
            address: None,
            provider: None,
            history: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the required game service backend
    pub fn api(self, api: impl GameApi + 'static) -> Self {
        self.shared_api(Arc::new(api))
    }

    pub fn shared_api(mut self, api: Arc<dyn GameApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Set the required account address
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Set the decision provider (default: from config)
    pub fn provider(mut self, provider: impl DecisionProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Set the history repository (default: `config.history_file`, else in memory)
    pub fn history(mut self, history: impl HistoryRepository + 'static) -> Self {
        self.history = Some(Arc::new(history));
        self
    }

    /// Build the runtime
    ///
    /// Nothing is fetched yet; call [`RuntimeHandle::load`] to sync.
    pub fn build(self) -> Result<Runtime> {
        let api = self.api.ok_or(RuntimeError::MissingApi)?;
        let address = self.address.ok_or(RuntimeError::MissingAccount)?;

        let history: Arc<dyn HistoryRepository> = match (self.history, &self.config.history_file)
        {
            (Some(history), _) => history,
            (None, Some(path)) => Arc::new(FileHistory::new(path)?),
            (None, None) => Arc::new(InMemoryHistory::new()),
        };
        let provider = self
            .provider
            .unwrap_or_else(|| self.config.provider.build());

        let ctx = ApiContext::new(
            api,
            address,
            SessionStore::new(),
            EventBus::with_capacity(self.config.event_buffer_size),
            self.config.api_timeout,
        );
        let tokens = Arc::new(ActionTokenTracker::new());

        let energy = EnergyScheduler::new(ctx.clone(), &self.config.energy);
        let runs = RunOrchestrator::new(
            ctx.clone(),
            Arc::clone(&tokens),
            energy.clone(),
            provider,
            Arc::clone(&history),
            self.config.autoplay.clone(),
        );
        let claims = ClaimOrchestrator::new(ctx.clone(), energy.clone(), self.config.claim.clone());

        tracing::debug!(
            address = %ctx.address,
            provider = runs.provider().name(),
            "runtime built"
        );

        let handle = RuntimeHandle::new(ctx, tokens, energy, runs, claims, history);
        Ok(Runtime { handle })
    }
}
