//! Built-in deterministic provider.
//!
//! Stands in for a network-backed generative provider so the CLI works
//! offline. Replies are a pure function of the prompt: same request, same
//! itinerary. Refinement feedback scales costs down, which exercises the
//! full validate -> refine loop end to end.

use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;
use serde_json::json;

use wayfarer_core::generator::DayPrompt;
use wayfarer_core::provider::{DayProvider, ProviderError};

pub struct SampleProvider;

/// Activity templates cycled per day. Times are pre-spaced so the
/// logistics validator has realistic gaps to check.
const TEMPLATES: &[(&str, &str, &str, f64, u32)] = &[
    ("09:00", "Historic Center Walking Tour", "activity", 0.12, 120),
    ("12:30", "Market Hall Lunch", "meal", 0.10, 60),
    ("14:30", "City Museum", "activity", 0.15, 120),
    ("17:30", "Riverside Promenade", "activity", 0.0, 60),
    ("19:30", "Neighborhood Bistro Dinner", "meal", 0.18, 90),
];

fn seed(destination: &str, day_number: u32) -> u64 {
    let mut hasher = DefaultHasher::new();
    destination.to_lowercase().hash(&mut hasher);
    day_number.hash(&mut hasher);
    hasher.finish()
}

#[async_trait]
impl DayProvider for SampleProvider {
    fn name(&self) -> &str {
        "sample"
    }

    async fn generate(&self, prompt: &DayPrompt) -> Result<String, ProviderError> {
        let seed = seed(&prompt.destination, prompt.day_number);
        // Base coordinates derived from the destination name, jittered a
        // few hundred meters per activity so distances stay walkable.
        let base_lat = 35.0 + (seed % 2000) as f64 / 100.0;
        let base_lon = -10.0 + (seed % 4000) as f64 / 100.0;

        // Feedback means a validator flagged this day; tighten spending.
        let cost_scale = if prompt.feedback.is_some() { 0.5 } else { 1.0 };

        let activities: Vec<serde_json::Value> = TEMPLATES
            .iter()
            .enumerate()
            .map(|(i, (start, name, category, budget_share, duration))| {
                let jitter = ((seed >> (i * 8)) % 100) as f64 / 20_000.0;
                json!({
                    "start_time": start,
                    "name": format!("{name} (day {})", prompt.day_number),
                    "description": format!("{name} in {}", prompt.destination),
                    "category": category,
                    "estimated_cost": (prompt.daily_budget * budget_share * cost_scale).round(),
                    "duration_minutes": duration,
                    "location": prompt.destination.clone(),
                    "lat": base_lat + jitter,
                    "lon": base_lon + jitter,
                    "transport_mode": if i == 0 { "metro" } else { "walk" }
                })
            })
            .collect();

        let reply = json!({
            "title": format!("{} day {} ({:?})", prompt.destination, prompt.day_number, prompt.day_type),
            "activities": activities,
            "local_food": [
                {
                    "name": format!("Local specialty no. {}", seed % 7 + 1),
                    "estimated_cost": (prompt.daily_budget * 0.05).round()
                }
            ]
        });
        Ok(reply.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wayfarer_core::model::TravelStyle;

    fn prompt(destination: &str, day_number: u32, feedback: Option<String>) -> DayPrompt {
        DayPrompt {
            destination: destination.to_string(),
            day_number,
            total_days: 3,
            date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            day_type: wayfarer_core::generator::DayType::classify(day_number, 3),
            style: TravelStyle::Balanced,
            group_size: 1,
            daily_budget: 100.0,
            currency: "USD".to_string(),
            prior_summaries: Vec::new(),
            feedback,
        }
    }

    #[tokio::test]
    async fn replies_are_deterministic() {
        let a = SampleProvider.generate(&prompt("Lisbon", 1, None)).await.unwrap();
        let b = SampleProvider.generate(&prompt("Lisbon", 1, None)).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn replies_parse_into_full_days() {
        let raw = SampleProvider.generate(&prompt("Lisbon", 2, None)).await.unwrap();
        let day = wayfarer_core::generator::parse_day_reply(
            &raw,
            2,
            NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
        );
        assert_eq!(day.activities.len(), 5);
        assert_eq!(day.local_food.len(), 1);
        assert!(day.activities.iter().all(|a| a.coords.is_some()));
    }

    #[tokio::test]
    async fn feedback_halves_spending() {
        let normal = SampleProvider.generate(&prompt("Lisbon", 1, None)).await.unwrap();
        let refined = SampleProvider
            .generate(&prompt("Lisbon", 1, Some("cut costs".into())))
            .await
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let normal_cost = wayfarer_core::generator::parse_day_reply(&normal, 1, date).total_cost();
        let refined_cost = wayfarer_core::generator::parse_day_reply(&refined, 1, date).total_cost();
        assert!(refined_cost < normal_cost);
    }
}
