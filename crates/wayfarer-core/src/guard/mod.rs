//! Generation budget guard: hard ceilings on day count, wall-clock time,
//! and provider calls.
//!
//! Exceeding any ceiling is a hard stop, not a throttle. The orchestrator
//! checks the day-count ceiling before emitting anything, and the
//! wall-clock and call ceilings before each day and before each
//! validation pass.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Which ceiling was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetKind {
    DayCount,
    WallClock,
    ProviderCalls,
}

impl std::fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DayCount => "day count",
            Self::WallClock => "wall clock",
            Self::ProviderCalls => "provider calls",
        };
        f.write_str(s)
    }
}

/// Terminal error: a generation budget ceiling was hit.
#[derive(Debug, Clone, thiserror::Error)]
#[error("generation budget exceeded ({kind}): {detail}")]
pub struct BudgetExceeded {
    pub kind: BudgetKind,
    pub detail: String,
}

/// Ceilings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Maximum requested day count.
    pub max_days: u32,
    /// Maximum calls to the generative provider, including refinement.
    pub max_provider_calls: u32,
    /// Maximum wall-clock seconds for the whole run.
    pub max_wall_clock_secs: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_days: 14,
            max_provider_calls: 60,
            max_wall_clock_secs: 600,
        }
    }
}

/// Run-scoped guard state: a start instant plus a provider-call counter.
#[derive(Debug)]
pub struct GenerationGuard {
    config: GuardConfig,
    started: Instant,
    provider_calls: u32,
}

impl GenerationGuard {
    /// Start the guard clock for a new run.
    pub fn start(config: GuardConfig) -> Self {
        Self {
            config,
            started: Instant::now(),
            provider_calls: 0,
        }
    }

    /// Reject runs whose requested day count exceeds the ceiling. Checked
    /// once, before any day is generated.
    pub fn check_day_count(&self, requested: u32) -> Result<(), BudgetExceeded> {
        if requested > self.config.max_days {
            return Err(BudgetExceeded {
                kind: BudgetKind::DayCount,
                detail: format!(
                    "requested {requested} days, ceiling is {}",
                    self.config.max_days
                ),
            });
        }
        Ok(())
    }

    /// Check the wall-clock and provider-call ceilings. Called at every
    /// loop boundary.
    pub fn check(&self) -> Result<(), BudgetExceeded> {
        let elapsed = self.started.elapsed();
        if elapsed > Duration::from_secs(self.config.max_wall_clock_secs) {
            return Err(BudgetExceeded {
                kind: BudgetKind::WallClock,
                detail: format!(
                    "elapsed {}s, ceiling is {}s",
                    elapsed.as_secs(),
                    self.config.max_wall_clock_secs
                ),
            });
        }
        if self.provider_calls >= self.config.max_provider_calls {
            return Err(BudgetExceeded {
                kind: BudgetKind::ProviderCalls,
                detail: format!(
                    "{} provider calls made, ceiling is {}",
                    self.provider_calls, self.config.max_provider_calls
                ),
            });
        }
        Ok(())
    }

    /// Record one provider call.
    pub fn record_provider_call(&mut self) {
        self.provider_calls += 1;
    }

    /// Provider calls made so far.
    pub fn provider_calls(&self) -> u32 {
        self.provider_calls
    }

    /// Wall-clock time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
