//! Shared plumbing for components that talk to the game service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use client_api_core::{ApiError, GameApi};

use crate::events::EventBus;
use crate::store::SessionStore;

/// Service handle, account, store and bus shared by every component.
#[derive(Clone)]
pub struct ApiContext {
    pub api: Arc<dyn GameApi>,
    pub address: Arc<str>,
    pub store: SessionStore,
    pub bus: EventBus,
    pub call_timeout: Duration,
}

impl ApiContext {
    pub fn new(
        api: Arc<dyn GameApi>,
        address: impl Into<Arc<str>>,
        store: SessionStore,
        bus: EventBus,
        call_timeout: Duration,
    ) -> Self {
        Self {
            api,
            address: address.into(),
            store,
            bus,
            call_timeout,
        }
    }

    /// Await one service call, giving up after `call_timeout`.
    pub async fn call<T, F>(&self, request: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        match tokio::time::timeout(self.call_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(self.call_timeout)),
        }
    }

    /// Record a failure for display and hand it back.
    pub(crate) fn note_error<E: std::fmt::Display>(&self, error: E) -> E {
        self.store.set_last_error(error.to_string());
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_api_core::MockGameApi;

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out() {
        let mock = MockGameApi::new(10);
        mock.set_latency(Some(Duration::from_secs(30)));
        let ctx = ApiContext::new(
            Arc::new(mock),
            "0xabc",
            SessionStore::new(),
            EventBus::new(),
            Duration::from_secs(5),
        );

        let result = ctx.call(ctx.api.get_energy(&ctx.address)).await;
        assert_eq!(result, Err(ApiError::Timeout(Duration::from_secs(5))));
    }
}
