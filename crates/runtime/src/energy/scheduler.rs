//! Single-timer energy refresh loop.
//!
//! The scheduler fetches energy, computes the next boundary, sleeps until
//! then, and repeats until energy is full or regeneration stops. Each
//! `start` cancels the previous cycle before spawning a new one, so at most
//! one timer is ever armed. A fetch that completes after `stop` is dropped
//! on the floor instead of re-arming.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use client_api_core::EnergyState;

use super::model::EnergyModel;
use crate::api::{Result, RuntimeError};
use crate::config::{EnergyConfig, RetryPolicy};
use crate::context::ApiContext;
use crate::events::EnergyEvent;

/// Externally visible scheduler state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    /// No timer armed.
    #[default]
    Idle,
    /// Waiting for the next boundary.
    Scheduled,
    /// Fetching from the server.
    Refreshing,
}

#[derive(Default)]
struct Control {
    state: SchedulerState,
    /// Present while the scheduler is started.
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

struct SchedulerInner {
    ctx: ApiContext,
    model: EnergyModel,
    retry: RetryPolicy,
    control: Mutex<Control>,
    armed: AtomicUsize,
}

/// Cloneable handle to the energy refresh loop.
#[derive(Clone)]
pub struct EnergyScheduler {
    inner: Arc<SchedulerInner>,
}

impl EnergyScheduler {
    pub fn new(ctx: ApiContext, config: &EnergyConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                ctx,
                model: EnergyModel::new(config.min_delay),
                retry: config.retry.clone(),
                control: Mutex::new(Control::default()),
                armed: AtomicUsize::new(0),
            }),
        }
    }

    /// Fetch energy now and keep a timer armed against the next boundary.
    ///
    /// Restarting cancels the running cycle first.
    pub fn start(&self) {
        let mut control = self.inner.lock();
        self.arm(&mut control, None);
    }

    /// Cancel any armed timer. Idempotent.
    pub fn stop(&self) {
        let mut control = self.inner.lock();
        if let Some(cancel) = control.cancel.take() {
            cancel.cancel();
            tracing::debug!(target: "runtime::energy", "energy scheduler stopped");
        }
        control.state = SchedulerState::Idle;
        control.task = None;
    }

    /// Stop and wait for the background cycle to exit.
    pub async fn shutdown(&self) -> Result<()> {
        let task = {
            let mut control = self.inner.lock();
            if let Some(cancel) = control.cancel.take() {
                cancel.cancel();
            }
            control.state = SchedulerState::Idle;
            control.task.take()
        };
        if let Some(task) = task {
            task.await.map_err(RuntimeError::WorkerJoin)?;
        }
        Ok(())
    }

    /// One-shot fetch that updates the store.
    ///
    /// When the scheduler is started, the timer is re-armed from the fresh
    /// value; a stopped scheduler stays stopped.
    pub async fn refresh(&self) -> Result<EnergyState> {
        let ctx = &self.inner.ctx;
        let energy = ctx
            .call(ctx.api.get_energy(&ctx.address))
            .await
            .map_err(|e| ctx.note_error(e))?;

        ctx.store.set_energy(energy);
        ctx.bus.publish(EnergyEvent::Refreshed(energy));

        // Checked and re-armed under one lock so a concurrent stop wins.
        let mut control = self.inner.lock();
        if control.cancel.is_some() {
            self.arm(&mut control, Some(energy));
        }
        Ok(energy)
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.lock().state
    }

    /// Whether `start` was called without a matching `stop`.
    pub fn is_running(&self) -> bool {
        self.inner.lock().cancel.is_some()
    }

    /// Timers currently waiting on a boundary.
    pub fn armed_timers(&self) -> usize {
        self.inner.armed.load(Ordering::SeqCst)
    }

    fn arm(&self, control: &mut Control, seed: Option<EnergyState>) {
        if let Some(previous) = control.cancel.take() {
            previous.cancel();
        }

        let cancel = CancellationToken::new();
        control.cancel = Some(cancel.clone());
        control.state = SchedulerState::Refreshing;

        let inner = Arc::clone(&self.inner);
        control.task = Some(tokio::spawn(run_cycle(inner, cancel, seed)));
    }
}

impl SchedulerInner {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `state` unless this cycle has been cancelled.
    fn transition(&self, cancel: &CancellationToken, state: SchedulerState) -> bool {
        let mut control = self.lock();
        if cancel.is_cancelled() {
            return false;
        }
        control.state = state;
        true
    }

    /// Store a fetched value unless this cycle has been cancelled.
    fn commit(&self, cancel: &CancellationToken, energy: EnergyState) -> bool {
        {
            let _control = self.lock();
            if cancel.is_cancelled() {
                return false;
            }
            self.ctx.store.set_energy(energy);
        }
        self.ctx.bus.publish(EnergyEvent::Refreshed(energy));
        true
    }

    async fn fetch_with_retry(&self, cancel: &CancellationToken) -> Option<EnergyState> {
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=attempts {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                result = self.ctx.call(self.ctx.api.get_energy(&self.ctx.address)) => result,
            };

            match result {
                Ok(energy) => {
                    tracing::debug!(
                        target: "runtime::energy",
                        visible = energy.visible(),
                        capacity = energy.capacity,
                        "energy refreshed"
                    );
                    return self.commit(cancel, energy).then_some(energy);
                }
                Err(error) => {
                    tracing::warn!(
                        target: "runtime::energy",
                        attempt,
                        attempts,
                        %error,
                        "energy refresh failed"
                    );
                    self.ctx.store.set_last_error(error.to_string());
                    self.ctx.bus.publish(EnergyEvent::RefreshFailed {
                        attempt,
                        error: error.to_string(),
                    });

                    if attempt < attempts {
                        let backoff = self.retry.backoff(attempt);
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return None,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                    }
                }
            }
        }

        tracing::warn!(
            target: "runtime::energy",
            attempts,
            "giving up on energy refresh until restarted"
        );
        if self.transition(cancel, SchedulerState::Idle) {
            self.ctx.bus.publish(EnergyEvent::Idle);
        }
        None
    }
}

/// Decrements the armed-timer count when the wait ends, however it ends.
struct ArmedTimer<'a>(&'a AtomicUsize);

impl<'a> ArmedTimer<'a> {
    fn new(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for ArmedTimer<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn run_cycle(
    inner: Arc<SchedulerInner>,
    cancel: CancellationToken,
    mut seed: Option<EnergyState>,
) {
    loop {
        let energy = match seed.take() {
            Some(energy) => energy,
            None => match inner.fetch_with_retry(&cancel).await {
                Some(energy) => energy,
                None => return,
            },
        };

        let Some(delay) = inner.model.delay_for(&energy) else {
            if inner.transition(&cancel, SchedulerState::Idle) {
                tracing::debug!(
                    target: "runtime::energy",
                    full = energy.is_full(),
                    "no energy boundary ahead; timer idle"
                );
                inner.ctx.bus.publish(EnergyEvent::Idle);
            }
            return;
        };

        if !inner.transition(&cancel, SchedulerState::Scheduled) {
            return;
        }
        tracing::trace!(target: "runtime::energy", ?delay, "energy timer armed");
        inner.ctx.bus.publish(EnergyEvent::Scheduled { delay });

        {
            let _armed = ArmedTimer::new(&inner.armed);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if !inner.transition(&cancel, SchedulerState::Refreshing) {
            return;
        }
    }
}
