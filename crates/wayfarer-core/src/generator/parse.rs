//! Tolerant parsing of provider replies into a [`Day`].
//!
//! The provider is untrusted: replies may be fenced in markdown, carry
//! prose around the JSON, misspell categories, or omit fields. Parsing
//! never fails -- anything unusable degrades to a minimally valid empty
//! day so the run can continue.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::model::{
    Activity, ActivityCategory, Coordinates, Day, LocalFood, TransportMode,
};

/// Loose wire shape of a provider reply. Every field is optional or
/// defaulted; strictness is applied during mapping, not deserialization.
#[derive(Debug, Deserialize)]
struct RawDay {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    activities: Vec<RawActivity>,
    #[serde(default)]
    local_food: Vec<RawFood>,
}

#[derive(Debug, Deserialize)]
struct RawActivity {
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    estimated_cost: Option<f64>,
    #[serde(default)]
    duration_minutes: Option<u32>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    transport_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFood {
    name: String,
    #[serde(default)]
    estimated_cost: f64,
}

/// Parse a provider reply into a [`Day`].
///
/// Contract: never errors. Malformed JSON, a missing object, or an
/// all-garbage activity list each yield [`Day::empty`].
pub fn parse_day_reply(raw: &str, day_number: u32, date: NaiveDate) -> Day {
    let Some(json) = extract_json_object(raw) else {
        tracing::warn!(day_number, "provider reply contained no JSON object");
        return Day::empty(day_number, date);
    };

    let parsed: RawDay = match serde_json::from_str(json) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(day_number, error = %e, "provider reply failed to parse");
            return Day::empty(day_number, date);
        }
    };

    let activities: Vec<Activity> = parsed
        .activities
        .into_iter()
        .filter_map(map_activity)
        .collect();

    let local_food = parsed
        .local_food
        .into_iter()
        .map(|f| LocalFood {
            name: f.name,
            estimated_cost: f.estimated_cost.max(0.0),
        })
        .collect();

    Day {
        day_number,
        date,
        title: parsed
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Day {day_number}")),
        activities,
        local_food,
    }
}

/// Map one raw activity, dropping entries without a usable name.
fn map_activity(raw: RawActivity) -> Option<Activity> {
    let name = raw.name.filter(|n| !n.trim().is_empty())?;

    let coords = match (raw.lat, raw.lon) {
        (Some(lat), Some(lon)) if lat.abs() <= 90.0 && lon.abs() <= 180.0 => {
            Some(Coordinates { lat, lon })
        }
        _ => None,
    };

    Some(Activity {
        start_time: raw.start_time.unwrap_or_default(),
        name,
        description: raw.description.unwrap_or_default(),
        category: map_category(raw.category.as_deref()),
        estimated_cost: raw.estimated_cost.unwrap_or(0.0).max(0.0),
        duration_minutes: raw.duration_minutes.unwrap_or(60),
        location: raw.location.unwrap_or_default(),
        coords,
        transport_mode: raw.transport_mode.as_deref().and_then(map_transport_mode),
        dedup_key: None,
        cost_verification: None,
        place: None,
    })
}

/// Map a category string, tolerating case and common variants. Unknown
/// categories fall back to `activity`.
fn map_category(raw: Option<&str>) -> ActivityCategory {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("meal" | "food" | "restaurant" | "dining") => ActivityCategory::Meal,
        Some("transport" | "transit" | "transfer" | "travel") => ActivityCategory::Transport,
        Some("lodging" | "hotel" | "accommodation") => ActivityCategory::Lodging,
        _ => ActivityCategory::Activity,
    }
}

fn map_transport_mode(raw: &str) -> Option<TransportMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "walk" | "walking" => Some(TransportMode::Walk),
        "metro" | "subway" => Some(TransportMode::Metro),
        "bus" => Some(TransportMode::Bus),
        "taxi" | "car" | "rideshare" => Some(TransportMode::Taxi),
        "train" | "rail" => Some(TransportMode::Train),
        _ => None,
    }
}

/// Extract the outermost JSON object from a reply, stripping markdown
/// fences and surrounding prose.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}
