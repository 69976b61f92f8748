//! Integration tests for the validate -> refine -> re-validate loop
//! driven through the full engine stream.

use std::sync::Arc;

use futures::StreamExt;
use tokio::time::{Duration, timeout};

use wayfarer_core::director::OverallStatus;
use wayfarer_core::event::StreamEvent;
use wayfarer_core::model::GenerationRequest;
use wayfarer_core::orchestrator::Engine;
use wayfarer_core::persist::NullSink;
use wayfarer_core::validator::BudgetStatus;

use wayfarer_test_utils::{ScriptedProvider, day_reply_json, overpriced_reply_json, request};

fn validated_request(num_days: u32, total_budget: f64) -> GenerationRequest {
    let mut r = request("Lisbon", num_days, total_budget);
    r.validation_enabled = true;
    r
}

async fn run(provider: Arc<ScriptedProvider>, req: GenerationRequest) -> Vec<StreamEvent> {
    let engine = Engine::new(provider, Arc::new(NullSink));
    timeout(
        Duration::from_secs(10),
        engine.stream(req, None).collect::<Vec<_>>(),
    )
    .await
    .expect("run did not finish")
}

#[tokio::test]
async fn clean_itinerary_validates_once_and_passes() {
    let provider = Arc::new(ScriptedProvider::default_replies());
    let events = run(provider.clone(), validated_request(2, 500.0)).await;

    let validations: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Validation { .. }))
        .collect();
    assert_eq!(validations.len(), 1);
    let StreamEvent::Validation {
        id,
        iteration,
        flagged_days,
        log,
        ..
    } = validations[0]
    else {
        unreachable!()
    };
    assert_eq!(id, "validation-1");
    assert_eq!(*iteration, 0);
    assert!(flagged_days.is_empty());
    assert!(!log.is_empty());

    assert!(!events.iter().any(|e| matches!(e, StreamEvent::Refinement { .. })));

    let StreamEvent::Done { verdict, .. } = events.last().unwrap() else {
        panic!("missing done");
    };
    let verdict = verdict.as_ref().expect("validated run carries a verdict");
    assert_eq!(verdict.status, OverallStatus::Approved);
    assert_eq!(verdict.iterations, 0);
}

#[tokio::test]
async fn rejected_day_is_refined_and_reemitted() {
    // Day 1 blows the budget; the refinement pass replaces it with a
    // cheap day and the second validation approves.
    let provider = Arc::new(ScriptedProvider::new([
        overpriced_reply_json(1, 3000.0),
        day_reply_json(2),
    ]));
    let events = run(provider.clone(), validated_request(2, 500.0)).await;

    // First validation rejects on budget and flags day 1.
    let StreamEvent::Validation {
        budget_status,
        flagged_days,
        ..
    } = events
        .iter()
        .find(|e| matches!(e, StreamEvent::Validation { .. }))
        .unwrap()
    else {
        unreachable!()
    };
    assert_eq!(*budget_status, BudgetStatus::OverBudget);
    assert_eq!(flagged_days, &vec![1]);

    // A refinement event announces day 1 with a concrete reason.
    let StreamEvent::Refinement {
        id,
        iteration,
        days,
        reason,
    } = events
        .iter()
        .find(|e| matches!(e, StreamEvent::Refinement { .. }))
        .unwrap()
    else {
        unreachable!()
    };
    assert_eq!(id, "refinement-1");
    assert_eq!(*iteration, 1);
    assert_eq!(days, &vec![1]);
    assert!(!reason.is_empty());

    // Day 1 is re-emitted under the same id, marked refined.
    let refined: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Day { id, day, refined: true, .. } => Some((id.clone(), day.day_number)),
            _ => None,
        })
        .collect();
    assert_eq!(refined, vec![("day-1".to_string(), 1)]);

    // The refined prompt carried the violated constraint.
    let prompts = provider.prompts();
    let refine_prompt = prompts.last().unwrap();
    assert_eq!(refine_prompt.day_number, 1);
    let feedback = refine_prompt.feedback.as_deref().unwrap();
    assert!(feedback.contains("allocated"), "feedback: {feedback}");

    // Second validation approves; done carries the final verdict.
    let StreamEvent::Done { verdict, .. } = events.last().unwrap() else {
        panic!("missing done");
    };
    let verdict = verdict.as_ref().unwrap();
    assert_eq!(verdict.status, OverallStatus::Approved);
    assert_eq!(verdict.iterations, 1);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn refinement_stops_at_the_iteration_cap() {
    // Every regeneration of day 1 is still over budget: after two
    // refinement passes the best available result is accepted.
    let provider = Arc::new(ScriptedProvider::new([
        overpriced_reply_json(1, 3000.0),
        day_reply_json(2),
        overpriced_reply_json(1, 2800.0),
        overpriced_reply_json(1, 2600.0),
    ]));
    let events = run(provider.clone(), validated_request(2, 500.0)).await;

    let validations = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Validation { .. }))
        .count();
    let refinements = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Refinement { .. }))
        .count();
    assert_eq!(validations, 3);
    assert_eq!(refinements, 2);
    assert_eq!(provider.calls(), 4);

    // The run still terminates with done, not an error.
    let StreamEvent::Done { complete, verdict, .. } = events.last().unwrap() else {
        panic!("missing done");
    };
    assert!(complete);
    assert_eq!(verdict.as_ref().unwrap().status, OverallStatus::Rejected);
    assert_eq!(verdict.as_ref().unwrap().iterations, 2);
}

#[tokio::test]
async fn validation_disabled_skips_the_loop() {
    let provider = Arc::new(ScriptedProvider::new([overpriced_reply_json(1, 3000.0)]));
    let events = run(provider.clone(), request("Lisbon", 1, 100.0)).await;

    assert!(!events.iter().any(|e| matches!(e, StreamEvent::Validation { .. })));
    let StreamEvent::Done { verdict, complete, .. } = events.last().unwrap() else {
        panic!("missing done");
    };
    assert!(verdict.is_none());
    assert!(complete);
    assert_eq!(provider.calls(), 1);
}
