//! Optional enrichment collaborators: place metadata and cost
//! verification.
//!
//! Enrichment must never block the core loop. Failures are logged and
//! skipped; an activity without metadata is simply shown as unverified.
//! The cache here is collaborator-side state (bounded, TTL-evicted), not
//! run state -- run state is owned by the orchestrator and dies with the
//! run.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Activity;

// ---------------------------------------------------------------------------
// Enricher trait
// ---------------------------------------------------------------------------

/// Errors from an enrichment lookup. All of them are skippable.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("enrichment source unavailable: {0}")]
    Unavailable(String),

    #[error("no match found for {0:?}")]
    NoMatch(String),
}

/// Collaborator that attaches confidence-scored place and cost metadata
/// to an activity. Implementations may consult external sources; the
/// orchestrator calls this best-effort and continues on any error.
#[async_trait]
pub trait PlaceEnricher: Send + Sync {
    fn name(&self) -> &str;

    /// Attach metadata to the activity in place.
    async fn enrich(&self, activity: &mut Activity) -> Result<(), EnrichError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlaceEnricher) {}
};

// ---------------------------------------------------------------------------
// Cost verification
// ---------------------------------------------------------------------------

/// Thresholds for consuming collaborator cost-verification metadata.
///
/// The variance cut-offs and freshness window are hand-tuned and pending
/// domain review; they are configuration, not behavior, so deployments
/// can adjust them without a release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Relative variance above which a verified cost is only a caution.
    pub warn_variance: f64,
    /// Relative variance above which verification data is discounted.
    pub reject_variance: f64,
    /// Verification older than this is treated as stale.
    pub freshness_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            warn_variance: 0.20,
            reject_variance: 0.40,
            freshness_secs: 7 * 24 * 3600,
        }
    }
}

/// How much to trust an activity's estimated cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostConfidence {
    /// Verified recently and within the warn variance.
    Verified,
    /// Verified but the estimate deviates noticeably.
    Caution,
    /// Verification data too divergent or too old to rely on.
    Stale,
    /// No verification metadata attached.
    Unverified,
}

/// Grade the trustworthiness of an activity's estimated cost from its
/// carried verification metadata.
pub fn cost_confidence(
    activity: &Activity,
    config: &VerificationConfig,
    now: DateTime<Utc>,
) -> CostConfidence {
    let Some(v) = &activity.cost_verification else {
        return CostConfidence::Unverified;
    };

    let age = now.signed_duration_since(v.checked_at);
    if age.num_seconds() < 0 || age.num_seconds() as u64 > config.freshness_secs {
        return CostConfidence::Stale;
    }

    let baseline = v.verified_cost.abs().max(1.0);
    let variance = (activity.estimated_cost - v.verified_cost).abs() / baseline;
    if variance > config.reject_variance {
        CostConfidence::Stale
    } else if variance > config.warn_variance {
        CostConfidence::Caution
    } else {
        CostConfidence::Verified
    }
}

// ---------------------------------------------------------------------------
// Enrichment cache
// ---------------------------------------------------------------------------

/// Counters for cache observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheEntry {
    value: serde_json::Value,
    inserted: Instant,
}

/// Bounded key-value cache with TTL for enrichment lookups.
///
/// Shared across requests by the enrichment collaborator, never by the
/// core run loop.
pub struct EnrichmentCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl EnrichmentCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up a key, expiring it if past its TTL.
    pub fn get(&mut self, key: &str) -> Option<serde_json::Value> {
        match self.entries.get(key) {
            Some(entry) if entry.inserted.elapsed() <= self.ttl => {
                self.hits += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                self.evictions += 1;
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert a value, evicting the oldest entry when at capacity.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        let key = key.into();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.inserted)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&oldest);
                self.evictions += 1;
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted: Instant::now(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActivityCategory, CostVerification};
    use serde_json::json;

    fn activity_with_verification(estimated: f64, verified: f64, age_secs: i64) -> Activity {
        Activity {
            start_time: "10:00".into(),
            name: "Museum".into(),
            description: String::new(),
            category: ActivityCategory::Activity,
            estimated_cost: estimated,
            duration_minutes: 60,
            location: String::new(),
            coords: None,
            transport_mode: None,
            dedup_key: None,
            cost_verification: Some(CostVerification {
                verified_cost: verified,
                confidence: 0.9,
                source: "pricing-db".into(),
                checked_at: Utc::now() - chrono::Duration::seconds(age_secs),
            }),
            place: None,
        }
    }

    #[test]
    fn unverified_without_metadata() {
        let mut a = activity_with_verification(10.0, 10.0, 0);
        a.cost_verification = None;
        assert_eq!(
            cost_confidence(&a, &VerificationConfig::default(), Utc::now()),
            CostConfidence::Unverified
        );
    }

    #[test]
    fn variance_grades() {
        let config = VerificationConfig::default();
        let now = Utc::now();
        // 10% off: verified.
        assert_eq!(
            cost_confidence(&activity_with_verification(110.0, 100.0, 60), &config, now),
            CostConfidence::Verified
        );
        // 30% off: caution.
        assert_eq!(
            cost_confidence(&activity_with_verification(130.0, 100.0, 60), &config, now),
            CostConfidence::Caution
        );
        // 50% off: too divergent.
        assert_eq!(
            cost_confidence(&activity_with_verification(150.0, 100.0, 60), &config, now),
            CostConfidence::Stale
        );
    }

    #[test]
    fn old_verification_is_stale() {
        let config = VerificationConfig::default();
        let age = (config.freshness_secs + 100) as i64;
        assert_eq!(
            cost_confidence(&activity_with_verification(100.0, 100.0, age), &config, Utc::now()),
            CostConfidence::Stale
        );
    }

    #[test]
    fn cache_get_set_and_stats() {
        let mut cache = EnrichmentCache::new(10, Duration::from_secs(60));
        assert_eq!(cache.get("louvre"), None);
        cache.set("louvre", json!({"rating": 4.7}));
        assert_eq!(cache.get("louvre"), Some(json!({"rating": 4.7})));

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn cache_expires_by_ttl() {
        let mut cache = EnrichmentCache::new(10, Duration::ZERO);
        cache.set("k", json!(1));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn cache_is_bounded() {
        let mut cache = EnrichmentCache::new(2, Duration::from_secs(60));
        cache.set("a", json!(1));
        cache.set("b", json!(2));
        cache.set("c", json!(3));
        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.evictions, 1);
        // The newest entry is always present.
        assert_eq!(cache.get("c"), Some(json!(3)));
    }

    #[test]
    fn cache_clear() {
        let mut cache = EnrichmentCache::new(4, Duration::from_secs(60));
        cache.set("a", json!(1));
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.get("a"), None);
    }
}
