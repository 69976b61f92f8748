//! Shared test utilities for wayfarer integration tests.
//!
//! Scripted provider doubles, a recording persistence sink, and builders
//! for requests, days, and provider reply payloads.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use wayfarer_core::generator::DayPrompt;
use wayfarer_core::model::{
    Activity, ActivityCategory, Coordinates, Day, GenerationRequest, TravelStyle,
};
use wayfarer_core::persist::PersistSink;
use wayfarer_core::provider::{DayProvider, ProviderError};

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Provider that pops canned replies off a queue, one per call.
///
/// When the queue runs dry it serves [`day_reply_json`] for the prompted
/// day, so tests only script the replies they care about.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicU32,
    prompts: Mutex<Vec<DayPrompt>>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = String>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Script raw outcomes, including provider errors.
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(outcomes.into_iter().collect()),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Provider with an empty script: every call gets a generated reply.
    pub fn default_replies() -> Self {
        Self::new([])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<DayPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DayProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &DayPrompt) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.prompts.lock().unwrap().push(prompt.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(day_reply_json(prompt.day_number)),
        }
    }
}

/// Provider whose every call fails.
pub struct FailingProvider;

#[async_trait]
impl DayProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _prompt: &DayPrompt) -> Result<String, ProviderError> {
        Err(ProviderError::Unavailable("scripted outage".into()))
    }
}

/// Provider that serves valid replies for the first `serve` calls, then
/// parks forever. For cancellation tests.
pub struct StallAfterProvider {
    serve: u32,
    calls: AtomicU32,
}

impl StallAfterProvider {
    pub fn new(serve: u32) -> Self {
        Self {
            serve,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DayProvider for StallAfterProvider {
    fn name(&self) -> &str {
        "stall-after"
    }

    async fn generate(&self, prompt: &DayPrompt) -> Result<String, ProviderError> {
        if self.calls.fetch_add(1, Ordering::Relaxed) < self.serve {
            Ok(day_reply_json(prompt.day_number))
        } else {
            std::future::pending().await
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Sink that records every saved day for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    saved: Mutex<Vec<Day>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<Day> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl PersistSink for RecordingSink {
    async fn save_day(&self, day: &Day, _all_days: &[Day]) -> anyhow::Result<()> {
        self.saved.lock().unwrap().push(day.clone());
        Ok(())
    }
}

/// Sink whose every call fails, for best-effort persistence tests.
pub struct FailingSink;

#[async_trait]
impl PersistSink for FailingSink {
    async fn save_day(&self, _day: &Day, _all_days: &[Day]) -> anyhow::Result<()> {
        anyhow::bail!("disk on fire")
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A small but complete generation request.
pub fn request(destination: &str, num_days: u32, total_budget: f64) -> GenerationRequest {
    GenerationRequest {
        destination: destination.to_string(),
        start_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
        num_days,
        style: TravelStyle::Balanced,
        total_budget,
        currency: "USD".to_string(),
        num_travelers: 1,
        group: None,
        validation_enabled: false,
        cost_verification_enabled: false,
    }
}

/// An activity with sane defaults at the given start time.
pub fn activity(name: &str, start_time: &str, cost: f64) -> Activity {
    Activity {
        start_time: start_time.to_string(),
        name: name.to_string(),
        description: format!("{name} (test)"),
        category: ActivityCategory::Activity,
        estimated_cost: cost,
        duration_minutes: 60,
        location: format!("{name} plaza"),
        coords: Some(Coordinates {
            lat: 48.8566,
            lon: 2.3522,
        }),
        transport_mode: None,
        dedup_key: None,
        cost_verification: None,
        place: None,
    }
}

/// A day populated with the given activities.
pub fn day(day_number: u32, activities: Vec<Activity>) -> Day {
    Day {
        day_number,
        date: NaiveDate::from_ymd_opt(2026, 5, 1)
            .unwrap()
            .checked_add_days(chrono::Days::new(u64::from(day_number.saturating_sub(1))))
            .unwrap(),
        title: format!("Day {day_number}"),
        activities,
        local_food: Vec::new(),
    }
}

/// A valid provider reply for one day, with two cheap activities whose
/// names embed the day number so dedup keys stay distinct across days.
pub fn day_reply_json(day_number: u32) -> String {
    json!({
        "title": format!("Day {day_number} highlights"),
        "activities": [
            {
                "start_time": "09:30",
                "name": format!("Old Town Walk {day_number}"),
                "description": "Guided morning walk",
                "category": "activity",
                "estimated_cost": 15.0,
                "duration_minutes": 90,
                "location": "Old Town",
                "lat": 48.8566,
                "lon": 2.3522,
                "transport_mode": "walk"
            },
            {
                "start_time": "13:00",
                "name": format!("Bistro Lunch {day_number}"),
                "description": "Local lunch spot",
                "category": "meal",
                "estimated_cost": 25.0,
                "duration_minutes": 60,
                "location": "Market Square",
                "lat": 48.8570,
                "lon": 2.3530
            }
        ],
        "local_food": [
            { "name": "Street crepes", "estimated_cost": 6.0 }
        ]
    })
    .to_string()
}

/// Reply whose single activity overruns the day budget by a wide margin.
pub fn overpriced_reply_json(day_number: u32, cost: f64) -> String {
    json!({
        "title": format!("Day {day_number} splurge"),
        "activities": [
            {
                "start_time": "10:00",
                "name": format!("Private Yacht Tour {day_number}"),
                "description": "Full-day charter",
                "category": "activity",
                "estimated_cost": cost,
                "duration_minutes": 240,
                "location": "Marina",
                "lat": 48.8600,
                "lon": 2.3400
            }
        ]
    })
    .to_string()
}
