//! Batch claiming of accumulated object yields.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use client_api_core::{ClaimCategory, ClaimableObject, EnergyState};

use crate::api::{Result, RuntimeError};
use crate::config::ClaimConfig;
use crate::context::ApiContext;
use crate::energy::EnergyScheduler;
use crate::events::ClaimEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimFailure {
    pub object_id: String,
    pub error: String,
}

/// Outcome of one claim pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReport {
    pub category: ClaimCategory,
    /// Object ids in the order they were attempted.
    pub planned: Vec<String>,
    pub claimed: Vec<String>,
    pub failed: Vec<ClaimFailure>,
    /// Sum of the yields of successful claims, as listed before claiming.
    pub total_claimed: u64,
}

impl ClaimReport {
    fn new(category: ClaimCategory, plan: &[ClaimableObject]) -> Self {
        Self {
            category,
            planned: plan.iter().map(|o| o.id.clone()).collect(),
            claimed: Vec::new(),
            failed: Vec::new(),
            total_claimed: 0,
        }
    }
}

/// Claimable totals per category, for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimTotals {
    pub dust: u64,
    pub shard: u64,
    pub energy: u64,
}

impl ClaimTotals {
    pub fn from_objects(objects: &[ClaimableObject]) -> Self {
        Self {
            dust: ClaimableObject::total(objects, ClaimCategory::Dust),
            shard: ClaimableObject::total(objects, ClaimCategory::Shard),
            energy: ClaimableObject::total(objects, ClaimCategory::Energy),
        }
    }

    pub fn get(&self, category: ClaimCategory) -> u64 {
        match category {
            ClaimCategory::Dust => self.dust,
            ClaimCategory::Shard => self.shard,
            ClaimCategory::Energy => self.energy,
        }
    }
}

/// Objects worth claiming for `category`, largest yield first.
///
/// Objects without yield are skipped; equal yields keep server order. For
/// energy, objects are taken while the running total (starting at the
/// current visible energy) is below capacity. The object that reaches
/// capacity is still taken, since the server clamps the overflow, and
/// everything after it is dropped.
pub fn plan_claims(
    objects: &[ClaimableObject],
    category: ClaimCategory,
    energy: Option<&EnergyState>,
) -> Vec<ClaimableObject> {
    let mut candidates: Vec<ClaimableObject> = objects
        .iter()
        .filter(|o| o.yield_for(category) > 0)
        .cloned()
        .collect();
    candidates.sort_by(|a, b| b.yield_for(category).cmp(&a.yield_for(category)));

    let Some(energy) = energy.filter(|_| category == ClaimCategory::Energy) else {
        return candidates;
    };

    let mut running = energy.visible();
    let mut plan = Vec::new();
    for object in candidates {
        if running >= energy.capacity {
            break;
        }
        running = running
            .saturating_add(object.energy_yield)
            .min(energy.capacity);
        plan.push(object);
    }
    plan
}

struct ClaimInner {
    ctx: ApiContext,
    energy: EnergyScheduler,
    config: ClaimConfig,
    busy: Mutex<()>,
}

#[derive(Clone)]
pub struct ClaimOrchestrator {
    inner: Arc<ClaimInner>,
}

impl ClaimOrchestrator {
    pub fn new(ctx: ApiContext, energy: EnergyScheduler, config: ClaimConfig) -> Self {
        Self {
            inner: Arc::new(ClaimInner {
                ctx,
                energy,
                config,
                busy: Mutex::new(()),
            }),
        }
    }

    /// Whether a claim pass is running.
    pub fn is_busy(&self) -> bool {
        self.inner.busy.try_lock().is_err()
    }

    pub async fn refresh_claimables(&self) -> Result<Vec<ClaimableObject>> {
        let ctx = &self.inner.ctx;
        let objects = ctx
            .call(ctx.api.get_claimables(&ctx.address))
            .await
            .map_err(|e| ctx.note_error(e))?;
        ctx.store.set_claimables(objects.clone());
        Ok(objects)
    }

    /// Claim one category from every object that has some.
    ///
    /// Claims run one at a time with a pause before each request. A failed
    /// claim is logged and skipped. Claimables are re-fetched afterwards,
    /// and energy too for energy claims. Only one pass may run at a time.
    pub async fn claim_all(&self, category: ClaimCategory) -> Result<ClaimReport> {
        let _busy = self
            .inner
            .busy
            .try_lock()
            .map_err(|_| RuntimeError::ClaimInProgress)?;
        let ctx = &self.inner.ctx;

        let objects = self.refresh_claimables().await?;
        let energy = if category == ClaimCategory::Energy {
            Some(self.current_energy().await?)
        } else {
            None
        };

        let plan = plan_claims(&objects, category, energy.as_ref());
        let mut report = ClaimReport::new(category, &plan);

        tracing::info!(
            target: "runtime::claim",
            %category,
            planned = plan.len(),
            available = objects.len(),
            "claim pass started"
        );
        ctx.bus.publish(ClaimEvent::BatchStarted {
            category,
            planned: plan.len(),
        });

        for object in &plan {
            tokio::time::sleep(self.inner.config.request_delay).await;

            let amount = object.yield_for(category);
            match ctx.call(ctx.api.claim(&object.id, category)).await {
                Ok(()) => {
                    tracing::debug!(
                        target: "runtime::claim",
                        object_id = %object.id,
                        %category,
                        amount,
                        "claimed"
                    );
                    report.claimed.push(object.id.clone());
                    report.total_claimed += amount;
                    ctx.bus.publish(ClaimEvent::Claimed {
                        object_id: object.id.clone(),
                        category,
                        amount,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        target: "runtime::claim",
                        object_id = %object.id,
                        %category,
                        %error,
                        "claim failed"
                    );
                    let error = ctx.note_error(error).to_string();
                    report.failed.push(ClaimFailure {
                        object_id: object.id.clone(),
                        error: error.clone(),
                    });
                    ctx.bus.publish(ClaimEvent::Failed {
                        object_id: object.id.clone(),
                        category,
                        error,
                    });
                }
            }
        }

        if let Err(error) = self.refresh_claimables().await {
            tracing::warn!(target: "runtime::claim", %error, "claimables refresh after pass failed");
        }
        if category == ClaimCategory::Energy
            && let Err(error) = self.inner.energy.refresh().await
        {
            tracing::warn!(target: "runtime::claim", %error, "energy refresh after pass failed");
        }

        tracing::info!(
            target: "runtime::claim",
            %category,
            claimed = report.claimed.len(),
            failed = report.failed.len(),
            total = report.total_claimed,
            "claim pass finished"
        );
        ctx.bus.publish(ClaimEvent::BatchFinished(report.clone()));
        Ok(report)
    }

    /// Fresh energy for the capacity cutoff, or the last snapshot when the
    /// fetch fails.
    async fn current_energy(&self) -> Result<EnergyState> {
        match self.inner.energy.refresh().await {
            Ok(energy) => Ok(energy),
            Err(error) => {
                tracing::warn!(target: "runtime::claim", %error, "using last known energy");
                self.inner
                    .ctx
                    .store
                    .energy()
                    .ok_or(RuntimeError::EnergyUnavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use client_api_core::{ApiCall, ApiError, MockGameApi, RawEnergy};
    use tokio::time::Instant;

    use crate::config::EnergyConfig;
    use crate::events::EventBus;
    use crate::store::SessionStore;

    fn object(id: &str, dust: u64, energy: u64) -> ClaimableObject {
        ClaimableObject {
            id: id.into(),
            dust_yield: dust,
            shard_yield: 0,
            energy_yield: energy,
        }
    }

    fn energy(visible: u64, capacity: u64) -> EnergyState {
        EnergyState {
            raw: RawEnergy::from_units(visible),
            capacity,
            regen_per_second: 0,
            boosted: false,
        }
    }

    fn orchestrator(mock: &MockGameApi) -> (ClaimOrchestrator, SessionStore) {
        let store = SessionStore::new();
        let ctx = ApiContext::new(
            Arc::new(mock.clone()),
            "0xabc",
            store.clone(),
            EventBus::new(),
            Duration::from_secs(5),
        );
        let energy = EnergyScheduler::new(ctx.clone(), &EnergyConfig::default());
        let config = ClaimConfig {
            request_delay: Duration::from_millis(800),
        };
        (ClaimOrchestrator::new(ctx, energy, config), store)
    }

    fn ids(objects: &[ClaimableObject]) -> Vec<&str> {
        objects.iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn energy_plan_stops_at_capacity() {
        let objects = [object("a", 0, 50), object("b", 0, 30), object("c", 0, 10)];
        let plan = plan_claims(&objects, ClaimCategory::Energy, Some(&energy(80, 100)));
        assert_eq!(ids(&plan), ["a"]);

        let plan = plan_claims(&objects, ClaimCategory::Energy, Some(&energy(10, 100)));
        assert_eq!(ids(&plan), ["a", "b", "c"]);

        let plan = plan_claims(&objects, ClaimCategory::Energy, Some(&energy(100, 100)));
        assert!(plan.is_empty());
    }

    #[test]
    fn totals_sum_each_category() {
        let objects = [object("a", 5, 2), object("b", 1, 0)];
        let totals = ClaimTotals::from_objects(&objects);
        assert_eq!(totals.get(ClaimCategory::Dust), 6);
        assert_eq!(totals.energy, 2);
        assert_eq!(totals.shard, 0);
    }

    #[test]
    fn plan_sorts_by_yield_and_skips_empty_objects() {
        let objects = [
            object("a", 5, 0),
            object("b", 0, 0),
            object("c", 9, 0),
            object("d", 5, 0),
        ];
        let plan = plan_claims(&objects, ClaimCategory::Dust, None);
        assert_eq!(ids(&plan), ["c", "a", "d"]);

        // The energy cutoff applies to energy claims only.
        let plan = plan_claims(&objects, ClaimCategory::Dust, Some(&energy(100, 100)));
        assert_eq!(plan.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn energy_pass_claims_only_up_to_capacity() {
        let mock = MockGameApi::new(100);
        mock.set_energy(energy(80, 100));
        mock.set_claimables(vec![object("a", 0, 50), object("b", 0, 30), object("c", 0, 10)]);
        let (claims, store) = orchestrator(&mock);

        let report = claims.claim_all(ClaimCategory::Energy).await.unwrap();

        assert_eq!(report.claimed, ["a"]);
        assert_eq!(report.total_claimed, 50);
        assert_eq!(mock.claimed(), [("a".to_string(), ClaimCategory::Energy)]);
        assert_eq!(store.energy().unwrap().visible(), 100);
        assert_eq!(store.claimables()[0].energy_yield, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_pass() {
        let mock = MockGameApi::new(100);
        mock.set_claimables(vec![object("a", 9, 0), object("b", 5, 0), object("c", 1, 0)]);
        mock.fail_claims_for("b");
        let (claims, store) = orchestrator(&mock);

        let report = claims.claim_all(ClaimCategory::Dust).await.unwrap();

        assert_eq!(report.planned, ["a", "b", "c"]);
        assert_eq!(report.claimed, ["a", "c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].object_id, "b");
        assert_eq!(report.total_claimed, 10);
        assert_eq!(mock.calls(ApiCall::GetClaimables), 2);
        assert_eq!(ClaimableObject::total(&store.claimables(), ClaimCategory::Dust), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn every_claim_waits_the_request_delay() {
        let mock = MockGameApi::new(100);
        mock.set_claimables(vec![object("a", 1, 0), object("b", 1, 0), object("c", 1, 0)]);
        let (claims, _) = orchestrator(&mock);

        let started = Instant::now();
        claims.claim_all(ClaimCategory::Dust).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(2400));
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_pass_at_a_time() {
        let mock = MockGameApi::new(100);
        mock.set_claimables(vec![object("a", 1, 0)]);
        let (claims, _) = orchestrator(&mock);

        let first = {
            let claims = claims.clone();
            tokio::spawn(async move { claims.claim_all(ClaimCategory::Dust).await })
        };
        tokio::task::yield_now().await;
        assert!(claims.is_busy());
        assert!(matches!(
            claims.claim_all(ClaimCategory::Dust).await,
            Err(RuntimeError::ClaimInProgress)
        ));

        assert_eq!(first.await.unwrap().unwrap().claimed, ["a"]);
        assert!(!claims.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_listing_aborts_before_claiming() {
        let mock = MockGameApi::new(100);
        mock.set_claimables(vec![object("a", 1, 0)]);
        mock.fail_next(ApiCall::GetClaimables, ApiError::Network("down".into()));
        let (claims, store) = orchestrator(&mock);

        assert!(claims.claim_all(ClaimCategory::Dust).await.is_err());
        assert_eq!(mock.calls(ApiCall::Claim), 0);
        assert!(store.last_error().is_some());
    }
}
