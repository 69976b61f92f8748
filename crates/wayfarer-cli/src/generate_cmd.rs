//! `wayfarer generate`: run the engine and print the event stream as
//! JSON lines on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use futures::StreamExt;

use wayfarer_core::config::EngineConfig;
use wayfarer_core::event::StreamEvent;
use wayfarer_core::model::{GenerationRequest, GroupProfile, TravelStyle};
use wayfarer_core::orchestrator::{Engine, ResumeState};
use wayfarer_core::persist::{NullSink, PersistSink};

use crate::sample::SampleProvider;
use crate::sink::{JsonFileSink, read_itinerary};

pub struct GenerateArgs {
    pub destination: String,
    pub days: u32,
    pub budget: f64,
    pub currency: String,
    pub start_date: Option<NaiveDate>,
    pub style: String,
    pub travelers: u32,
    pub toddler: bool,
    pub elderly: bool,
    pub mobility_impaired: bool,
    pub no_validation: bool,
    pub output: Option<PathBuf>,
    pub resume_from: Option<PathBuf>,
    pub last_event_id: Option<String>,
    pub engine_config: EngineConfig,
}

fn parse_style(raw: &str) -> anyhow::Result<TravelStyle> {
    match raw.to_lowercase().as_str() {
        "budget" => Ok(TravelStyle::Budget),
        "balanced" => Ok(TravelStyle::Balanced),
        "luxury" => Ok(TravelStyle::Luxury),
        other => bail!("unknown style {other:?} (expected budget, balanced, or luxury)"),
    }
}

pub async fn run(args: GenerateArgs) -> anyhow::Result<()> {
    let group = GroupProfile {
        has_toddler: args.toddler,
        has_elderly: args.elderly,
        has_mobility_impaired: args.mobility_impaired,
        size: args.travelers.max(1),
    };
    let request = GenerationRequest {
        destination: args.destination,
        start_date: args
            .start_date
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
        num_days: args.days,
        style: parse_style(&args.style)?,
        total_budget: args.budget,
        currency: args.currency,
        num_travelers: args.travelers.max(1),
        group: Some(group),
        validation_enabled: !args.no_validation,
        cost_verification_enabled: false,
    };

    let resume = match &args.resume_from {
        Some(path) => {
            let days = read_itinerary(path)?;
            tracing::info!(days = days.len(), file = %path.display(), "resuming from itinerary file");
            Some(ResumeState {
                days,
                last_event_id: args.last_event_id.clone(),
            })
        }
        None => None,
    };

    let sink: Arc<dyn PersistSink> = match &args.output {
        Some(path) => Arc::new(JsonFileSink::new(path)),
        None => Arc::new(NullSink),
    };

    let engine = Engine::new(Arc::new(SampleProvider), sink).with_config(args.engine_config);
    let mut stream = engine.stream(request, resume);

    let mut failed = false;
    while let Some(event) = stream.next().await {
        if matches!(event, StreamEvent::Error { recoverable: false, .. }) {
            failed = true;
        }
        let line = serde_json::to_string(&event).context("failed to serialize event")?;
        println!("{line}");
    }

    if failed {
        bail!("generation failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_parsing() {
        assert_eq!(parse_style("Luxury").unwrap(), TravelStyle::Luxury);
        assert_eq!(parse_style("balanced").unwrap(), TravelStyle::Balanced);
        assert!(parse_style("opulent").is_err());
    }

    fn sample_request(num_days: u32) -> GenerationRequest {
        GenerationRequest {
            destination: "Porto".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            num_days,
            style: TravelStyle::Balanced,
            total_budget: 900.0,
            currency: "EUR".to_string(),
            num_travelers: 2,
            group: None,
            validation_enabled: true,
            cost_verification_enabled: false,
        }
    }

    #[tokio::test]
    async fn sample_run_persists_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("itinerary.json");

        // First run writes all three days to disk.
        let engine = Engine::new(
            Arc::new(SampleProvider),
            Arc::new(JsonFileSink::new(&path)),
        );
        let events: Vec<StreamEvent> =
            engine.stream(sample_request(3), None).collect().await;
        assert!(matches!(
            events.last().unwrap(),
            StreamEvent::Done { complete: true, .. }
        ));

        let saved = read_itinerary(&path).unwrap();
        assert_eq!(saved.len(), 3);

        // Resuming from the file only generates what is missing.
        let resume = ResumeState {
            days: saved,
            last_event_id: Some("day-3".to_string()),
        };
        let engine = Engine::new(Arc::new(SampleProvider), Arc::new(NullSink));
        let events: Vec<StreamEvent> = engine
            .stream(sample_request(4), Some(resume))
            .collect()
            .await;

        let fresh_days: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Day { day, cached: false, .. } => Some(day.day_number),
                _ => None,
            })
            .collect();
        assert_eq!(fresh_days, vec![4]);
        assert!(matches!(
            events.last().unwrap(),
            StreamEvent::Done { complete: true, .. }
        ));
    }
}
