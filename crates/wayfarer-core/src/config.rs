//! Engine configuration: every tunable the validators, guard, and
//! orchestrator read, as one TOML-serializable value.

use serde::{Deserialize, Serialize};

use crate::enrich::VerificationConfig;
use crate::guard::GuardConfig;
use crate::validator::{BudgetConfig, LogisticsConfig};

/// All engine tunables. `Default` matches the documented defaults; any
/// field can be overridden via TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub budget: BudgetConfig,
    pub logistics: LogisticsConfig,
    pub guard: GuardConfig,
    pub verification: VerificationConfig,
    /// Seconds between heartbeat progress events.
    pub heartbeat_secs: u64,
    /// Capacity of the event channel between driver and consumer.
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            budget: BudgetConfig::default(),
            logistics: LogisticsConfig::default(),
            guard: GuardConfig::default(),
            verification: VerificationConfig::default(),
            heartbeat_secs: 15,
            event_buffer: 32,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document, filling unspecified fields with defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = EngineConfig::default();
        let toml = config.to_toml_string().unwrap();
        let back = EngineConfig::from_toml_str(&toml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            heartbeat_secs = 5

            [budget]
            buffer_fraction = 0.2

            [guard]
            max_days = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.heartbeat_secs, 5);
        assert_eq!(config.budget.buffer_fraction, 0.2);
        assert_eq!(config.guard.max_days, 7);
        // Untouched sections keep their defaults.
        assert_eq!(config.budget.reject_threshold, 0.20);
        assert_eq!(config.logistics.base_buffer_min, 15);
        assert_eq!(config.verification.warn_variance, 0.20);
        assert_eq!(config.event_buffer, 32);
    }
}
