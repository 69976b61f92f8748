//! Day generator: prompt construction for the generative provider and
//! tolerant parsing of its reply.
//!
//! This module contains pure logic. The orchestrator owns the provider
//! call itself, along with the call counter the generation guard checks.

pub mod parse;

pub use parse::parse_day_reply;

use chrono::NaiveDate;

use crate::model::{Day, GenerationRequest, TravelStyle};

// ---------------------------------------------------------------------------
// Day type
// ---------------------------------------------------------------------------

/// Positional classification of a day within the trip.
///
/// Purely positional: day 1 is arrival, the last day is departure,
/// everything else is mid-trip. This deliberately ignores actual flight
/// times; it is a known approximation, kept as such.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayType {
    Arrival,
    MidTrip,
    Departure,
}

impl DayType {
    pub fn classify(day_number: u32, total_days: u32) -> Self {
        if day_number <= 1 {
            Self::Arrival
        } else if day_number >= total_days {
            Self::Departure
        } else {
            Self::MidTrip
        }
    }

    fn guidance(self) -> &'static str {
        match self {
            Self::Arrival => {
                "This is the arrival day. Start after midday, keep the schedule \
                 light, and stay near the lodging area."
            }
            Self::MidTrip => {
                "This is a full day. Plan a complete morning-to-evening schedule."
            }
            Self::Departure => {
                "This is the departure day. End by mid-afternoon and avoid \
                 activities far from transit hubs."
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt context
// ---------------------------------------------------------------------------

/// Context assembled for one day-generation prompt.
#[derive(Debug, Clone)]
pub struct DayPrompt {
    pub destination: String,
    pub day_number: u32,
    pub total_days: u32,
    pub date: NaiveDate,
    pub day_type: DayType,
    pub style: TravelStyle,
    pub group_size: u32,
    /// Per-day cost target, in the request's currency.
    pub daily_budget: f64,
    pub currency: String,
    /// One-line summaries of the days generated so far, so the provider
    /// avoids repeating itself.
    pub prior_summaries: Vec<String>,
    /// Validator feedback, present only on refinement passes.
    pub feedback: Option<String>,
}

impl DayPrompt {
    /// Build the prompt context for one day of a run.
    pub fn for_day(
        request: &GenerationRequest,
        day_number: u32,
        daily_budget: f64,
        prior_summaries: Vec<String>,
        feedback: Option<String>,
    ) -> Self {
        Self {
            destination: request.destination.clone(),
            day_number,
            total_days: request.num_days,
            date: request.date_of_day(day_number),
            day_type: DayType::classify(day_number, request.num_days),
            style: request.style,
            group_size: request.group_profile().size,
            daily_budget,
            currency: request.currency.clone(),
            prior_summaries,
            feedback,
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt construction
// ---------------------------------------------------------------------------

/// JSON schema reference included in every day prompt.
const SCHEMA_REFERENCE: &str = r#"## Reply Schema

Reply with a single JSON object and nothing else:

```json
{
  "title": "string",
  "activities": [
    {
      "start_time": "HH:MM",
      "name": "string",
      "description": "string",
      "category": "activity | meal | transport | lodging",
      "estimated_cost": 0.0,
      "duration_minutes": 60,
      "location": "string",
      "lat": 0.0,
      "lon": 0.0,
      "transport_mode": "walk | metro | bus | taxi | train"
    }
  ],
  "local_food": [
    { "name": "string", "estimated_cost": 0.0 }
  ]
}
```

`lat`, `lon`, `transport_mode`, and `local_food` are optional.
"#;

/// Planning guidelines included in every day prompt.
const PLANNING_GUIDELINES: &str = r#"## Planning Guidelines

1. Plan 3-4 activities for the day, in chronological order.
2. Leave realistic travel time between consecutive locations.
3. Include at least one meal and keep the day's total near the budget target.
4. Never repeat an activity listed under "Already planned".
5. Use real, specific places; do not invent addresses.
"#;

/// Build the full prompt for one day.
pub fn build_day_prompt(ctx: &DayPrompt) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(&format!(
        "# Itinerary Day Planner\n\n\
         You are planning day {} of {} of a trip to {}.\n\
         Date: {}. Travellers: {}. Style: {:?}.\n\
         Budget target for this day: {:.0} {}.\n\n",
        ctx.day_number,
        ctx.total_days,
        ctx.destination,
        ctx.date,
        ctx.group_size,
        ctx.style,
        ctx.daily_budget,
        ctx.currency,
    ));

    prompt.push_str(ctx.day_type.guidance());
    prompt.push_str("\n\n");

    prompt.push_str(SCHEMA_REFERENCE);
    prompt.push('\n');
    prompt.push_str(PLANNING_GUIDELINES);

    if !ctx.prior_summaries.is_empty() {
        prompt.push_str("\n## Already planned\n\n");
        for summary in &ctx.prior_summaries {
            prompt.push_str(&format!("- {summary}\n"));
        }
    }

    if let Some(feedback) = &ctx.feedback {
        prompt.push_str(&format!(
            "\n## Revision Feedback\n\n\
             A previous version of this day failed validation. Fix the \
             following while keeping the day's overall shape:\n\n{feedback}\n"
        ));
    }

    prompt
}

/// One-line summary of a generated day, used as repetition-avoidance
/// context for later prompts.
pub fn summarize_day(day: &Day) -> String {
    let names: Vec<&str> = day.activities.iter().map(|a| a.name.as_str()).collect();
    if names.is_empty() {
        format!("Day {}: {} (no activities)", day.day_number, day.title)
    } else {
        format!("Day {}: {} - {}", day.day_number, day.title, names.join(", "))
    }
}
