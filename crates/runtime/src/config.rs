//! Runtime configuration structures and loaders.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::ProviderChoice;

/// Configuration shared across the orchestrators and the energy scheduler.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub autoplay: AutoPlayConfig,
    pub claim: ClaimConfig,
    pub energy: EnergyConfig,
    /// Upper bound for any single call to the game service.
    pub api_timeout: Duration,
    /// Decision provider installed when the builder is not given one.
    pub provider: ProviderChoice,
    pub event_buffer_size: usize,
    /// JSON-lines history file; in-memory history when unset.
    pub history_file: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            autoplay: AutoPlayConfig::default(),
            claim: ClaimConfig::default(),
            energy: EnergyConfig::default(),
            api_timeout: Duration::from_secs(15),
            provider: ProviderChoice::Random,
            event_buffer_size: 100,
            history_file: None,
        }
    }
}

impl RuntimeConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `AUTOPLAY_STEP_CAP` - Max iterations of one auto-play loop (default: 120)
    /// - `AUTOPLAY_PACE_MS` - Pause between auto-play moves (default: 50)
    /// - `CLAIM_DELAY_MS` - Pause before each claim request (default: 800)
    /// - `API_TIMEOUT_MS` - Per-call timeout (default: 15000)
    /// - `ENERGY_MIN_DELAY_MS` - Floor for the energy timer (default: 100)
    /// - `ENERGY_RETRY_ATTEMPTS` - Energy fetch attempts per cycle (default: 5)
    /// - `ENERGY_RETRY_BASE_MS` - First energy retry backoff (default: 1000)
    /// - `ENERGY_RETRY_MAX_MS` - Energy retry backoff ceiling (default: 30000)
    /// - `DECISION_PROVIDER` - `random` or `manual` (default: random)
    /// - `EVENT_BUFFER` - Broadcast capacity per topic (default: 100)
    /// - `HISTORY_FILE` - Persist run history to this JSON-lines file
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(cap) = read_env::<u32>("AUTOPLAY_STEP_CAP") {
            config.autoplay.step_cap = cap;
        }
        if let Some(ms) = read_env::<u64>("AUTOPLAY_PACE_MS") {
            config.autoplay.pace = Duration::from_millis(ms);
        }

        if let Some(ms) = read_env::<u64>("CLAIM_DELAY_MS") {
            config.claim.request_delay = Duration::from_millis(ms);
        }

        if let Some(ms) = read_env::<u64>("API_TIMEOUT_MS") {
            config.api_timeout = Duration::from_millis(ms.max(1));
        }

        if let Some(ms) = read_env::<u64>("ENERGY_MIN_DELAY_MS") {
            config.energy.min_delay = Duration::from_millis(ms);
        }
        if let Some(attempts) = read_env::<u32>("ENERGY_RETRY_ATTEMPTS") {
            config.energy.retry.max_attempts = attempts.max(1);
        }
        if let Some(ms) = read_env::<u64>("ENERGY_RETRY_BASE_MS") {
            config.energy.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = read_env::<u64>("ENERGY_RETRY_MAX_MS") {
            config.energy.retry.max_delay = Duration::from_millis(ms);
        }

        if let Some(choice) = read_env::<ProviderChoice>("DECISION_PROVIDER") {
            config.provider = choice;
        }

        if let Some(capacity) = read_env::<usize>("EVENT_BUFFER") {
            config.event_buffer_size = capacity.max(1);
        }

        config.history_file = env::var("HISTORY_FILE").ok().map(PathBuf::from);

        config
    }
}

#[derive(Clone, Debug)]
pub struct AutoPlayConfig {
    /// Iterations one loop may run before it stops on its own.
    pub step_cap: u32,
    /// Pause after each submission.
    pub pace: Duration,
}

impl Default for AutoPlayConfig {
    fn default() -> Self {
        Self {
            step_cap: 120,
            pace: Duration::from_millis(50),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClaimConfig {
    /// Pause before every claim request of a batch.
    pub request_delay: Duration,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(800),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EnergyConfig {
    /// Shortest delay the scheduler will arm a timer for.
    pub min_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(100),
            retry: RetryPolicy::default(),
        }
    }
}

/// Exponential backoff for failed energy fetches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per refresh cycle, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (1-based): `base * 2^(retry - 1)`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
