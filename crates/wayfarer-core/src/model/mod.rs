//! Core domain types for one generation run.
//!
//! Everything here is owned by a single run invocation: the orchestrator
//! creates these values at run start or per-day during the loop, and they
//! are discarded once the final `done`/`error` event is emitted. There is
//! no cross-run shared state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::guard::BudgetKind;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Spending posture requested for the trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelStyle {
    Budget,
    #[default]
    Balanced,
    Luxury,
}

/// Who is travelling. Supplied once per run and read by the logistics
/// validator to size inter-activity buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupProfile {
    pub has_toddler: bool,
    pub has_elderly: bool,
    pub has_mobility_impaired: bool,
    /// Number of travellers in the group.
    pub size: u32,
}

impl Default for GroupProfile {
    fn default() -> Self {
        Self {
            has_toddler: false,
            has_elderly: false,
            has_mobility_impaired: false,
            size: 1,
        }
    }
}

/// Immutable input for one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub destination: String,
    pub start_date: NaiveDate,
    pub num_days: u32,
    #[serde(default)]
    pub style: TravelStyle,
    pub total_budget: f64,
    pub currency: String,
    pub num_travelers: u32,
    #[serde(default)]
    pub group: Option<GroupProfile>,
    /// Run the validator/refinement loop after generation.
    #[serde(default = "default_true")]
    pub validation_enabled: bool,
    /// Consult collaborator-supplied cost verification metadata.
    #[serde(default)]
    pub cost_verification_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl GenerationRequest {
    /// Per-day cost target handed to the day generator. Uses the same
    /// buffered allocation the budget validator checks against so the
    /// provider is asked for what will later be accepted.
    pub fn daily_target(&self, buffer_fraction: f64) -> f64 {
        if self.num_days == 0 {
            return 0.0;
        }
        self.total_budget * (1.0 - buffer_fraction) / f64::from(self.num_days)
    }

    /// The group profile, defaulting to a solo group sized from
    /// `num_travelers` when none was supplied.
    pub fn group_profile(&self) -> GroupProfile {
        self.group.unwrap_or(GroupProfile {
            size: self.num_travelers.max(1),
            ..GroupProfile::default()
        })
    }

    /// Date of a given 1-based day number.
    pub fn date_of_day(&self, day_number: u32) -> NaiveDate {
        self.start_date + chrono::Duration::days(i64::from(day_number) - 1)
    }
}

// ---------------------------------------------------------------------------
// Activities and days
// ---------------------------------------------------------------------------

/// Category an activity's cost is bucketed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    Activity,
    Meal,
    Transport,
    Lodging,
}

impl ActivityCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Meal => "meal",
            Self::Transport => "transport",
            Self::Lodging => "lodging",
        }
    }
}

/// Transport modes the logistics validator can estimate travel time for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Walk,
    Metro,
    Bus,
    Taxi,
    Train,
}

impl TransportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Walk => "walk",
            Self::Metro => "metro",
            Self::Bus => "bus",
            Self::Taxi => "taxi",
            Self::Train => "train",
        }
    }
}

/// Geographic point, decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Collaborator-supplied cost check attached to an activity. The core
/// carries this data but never produces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostVerification {
    pub verified_cost: f64,
    /// Confidence score in `[0, 1]` reported by the verification source.
    pub confidence: f64,
    pub source: String,
    pub checked_at: DateTime<Utc>,
}

/// Collaborator-supplied place enrichment attached to an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceMetadata {
    pub place_id: String,
    pub rating: Option<f64>,
    /// Confidence score in `[0, 1]` for the place match.
    pub confidence: f64,
}

/// A single item on a day's schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Start time of day, e.g. `"09:00"` or `"2:30 PM"`.
    pub start_time: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: ActivityCategory,
    pub estimated_cost: f64,
    pub duration_minutes: u32,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub coords: Option<Coordinates>,
    #[serde(default)]
    pub transport_mode: Option<TransportMode>,
    /// Content-derived key used by the run-scoped deduplicator. Set once
    /// the activity survives the dedup pass.
    #[serde(default)]
    pub dedup_key: Option<String>,
    #[serde(default)]
    pub cost_verification: Option<CostVerification>,
    #[serde(default)]
    pub place: Option<PlaceMetadata>,
}

impl Activity {
    /// Start time as minutes since midnight, if the time string parses.
    pub fn start_minutes(&self) -> Option<u32> {
        parse_time_of_day(&self.start_time)
    }

    /// End time as minutes since midnight, if the start time parses.
    pub fn end_minutes(&self) -> Option<u32> {
        self.start_minutes().map(|m| m + self.duration_minutes)
    }
}

/// A local-food recommendation attached to a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalFood {
    pub name: String,
    #[serde(default)]
    pub estimated_cost: f64,
}

/// One generated day. Day numbers are 1-based, contiguous, and never
/// duplicated within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub day_number: u32,
    pub date: NaiveDate,
    pub title: String,
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub local_food: Vec<LocalFood>,
}

impl Day {
    /// Minimally valid empty day, substituted when the provider's reply
    /// cannot be parsed so the run can continue.
    pub fn empty(day_number: u32, date: NaiveDate) -> Self {
        Self {
            day_number,
            date,
            title: format!("Day {day_number} (unplanned)"),
            activities: Vec::new(),
            local_food: Vec::new(),
        }
    }

    /// Sum of activity and local-food costs for this day.
    pub fn total_cost(&self) -> f64 {
        let activities: f64 = self.activities.iter().map(|a| a.estimated_cost).sum();
        let food: f64 = self.local_food.iter().map(|f| f.estimated_cost).sum();
        activities + food
    }
}

// ---------------------------------------------------------------------------
// Time-of-day parsing
// ---------------------------------------------------------------------------

/// Parse a time-of-day string into minutes since midnight.
///
/// Accepts `"HH:MM"`, `"H:MM"`, and 12-hour forms with an `AM`/`PM`
/// suffix. Returns `None` for anything else; callers treat unparseable
/// times as "unknown" rather than failing the day.
pub fn parse_time_of_day(raw: &str) -> Option<u32> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let upper = s.to_ascii_uppercase();
    let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim().to_string(), Some(12u32))
    } else if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim().to_string(), Some(0u32))
    } else {
        (upper, None)
    };

    let (h, m) = match clock.split_once(':') {
        Some((h, m)) => (h.trim().parse::<u32>().ok()?, m.trim().parse::<u32>().ok()?),
        None => (clock.trim().parse::<u32>().ok()?, 0),
    };

    if m >= 60 {
        return None;
    }

    let hour = match meridiem {
        // 12 AM -> 0, 12 PM -> 12, 1 PM -> 13, ...
        Some(offset) => {
            if h == 0 || h > 12 {
                return None;
            }
            (h % 12) + offset
        }
        None => {
            if h >= 24 {
                return None;
            }
            h
        }
    };

    Some(hour * 60 + m)
}

// ---------------------------------------------------------------------------
// Run metrics
// ---------------------------------------------------------------------------

/// Counters accumulated over one run and reported in the final event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub days_generated: u32,
    pub days_cached: u32,
    pub provider_calls: u32,
    pub recoverable_errors: u32,
    /// Which generation budget ceiling was hit, if any.
    #[serde(default)]
    pub exceeded: Option<BudgetKind>,
}
