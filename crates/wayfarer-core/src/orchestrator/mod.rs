//! Stream orchestrator: sequences day generation, persistence,
//! validation, and event emission for one run.
//!
//! Day generation is strictly sequential -- day *i+1*'s prompt depends on
//! a summary of every prior day, so the ordering is a guarantee, not an
//! accident. The two validators run concurrently inside the director.
//! Cancellation is polled at every loop boundary (before starting a day,
//! before each provider call, before each validation iteration) and
//! races in-flight provider calls. Once observed, no further provider
//! calls are issued and whatever was generated and persisted is reported
//! back as partial.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dedup;
use crate::director::{self, CombinedVerdict, MAX_REFINEMENT_ITERATIONS, OverallStatus};
use crate::enrich::{PlaceEnricher, cost_confidence};
use crate::event::{EventIds, ResumeCursor, StreamEvent, VerdictSummary};
use crate::generator::{self, DayPrompt};
use crate::guard::{BudgetExceeded, GenerationGuard};
use crate::model::{Day, GenerationRequest, RunMetrics};
use crate::persist::PersistSink;
use crate::provider::DayProvider;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Builds run streams. One engine can serve many runs; each run owns its
/// own state (days, dedup keys, metrics) and shares nothing with other
/// runs.
pub struct Engine {
    provider: Arc<dyn DayProvider>,
    sink: Arc<dyn PersistSink>,
    enricher: Option<Arc<dyn PlaceEnricher>>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(provider: Arc<dyn DayProvider>, sink: Arc<dyn PersistSink>) -> Self {
        Self {
            provider,
            sink,
            enricher: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn PlaceEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Start a run and return its event stream.
    ///
    /// The returned stream is finite and non-restartable: it ends after a
    /// `done` event or a non-recoverable `error` event. Dropping it
    /// cancels the run and tears down the heartbeat deterministically.
    pub fn stream(&self, request: GenerationRequest, resume: Option<ResumeState>) -> RunStream {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let cancel = CancellationToken::new();
        let heartbeat_token = cancel.child_token();
        let ids = Arc::new(EventIds::default());
        let current_day = Arc::new(AtomicU32::new(0));

        let heartbeat = HeartbeatHandle::spawn(
            tx.clone(),
            Arc::clone(&ids),
            Arc::clone(&current_day),
            request.num_days,
            Duration::from_secs(self.config.heartbeat_secs.max(1)),
            heartbeat_token,
        );

        let driver = RunDriver {
            run_id: Uuid::new_v4(),
            request,
            config: self.config.clone(),
            provider: Arc::clone(&self.provider),
            sink: Arc::clone(&self.sink),
            enricher: self.enricher.clone(),
            tx,
            ids,
            cancel: cancel.clone(),
            current_day,
            guard: GenerationGuard::start(self.config.guard.clone()),
            metrics: RunMetrics::default(),
            days: Vec::new(),
            used_keys: HashSet::new(),
            last_verdict: None,
        };
        tokio::spawn(driver.run(resume, heartbeat));

        RunStream {
            events: ReceiverStream::new(rx),
            cancel: cancel.clone(),
            _teardown: cancel.drop_guard(),
        }
    }
}

/// Partial state handed in by a reconnecting consumer.
#[derive(Debug, Clone, Default)]
pub struct ResumeState {
    /// Days already generated in a previous attempt, 1..k contiguous.
    pub days: Vec<Day>,
    /// Identifier of the last event the consumer received, if known.
    /// Days it already saw are not replayed.
    pub last_event_id: Option<String>,
}

/// The ordered event sequence of one run.
pub struct RunStream {
    events: ReceiverStream<StreamEvent>,
    cancel: CancellationToken,
    _teardown: DropGuard,
}

impl RunStream {
    /// Token that cancels the run (e.g. wired to client disconnect).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Stream for RunStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

/// Keeps the delivery transport alive during long provider calls. Runs
/// off the generation critical path and is torn down via its token when
/// the driver finishes or the stream is dropped.
struct HeartbeatHandle {
    token: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl HeartbeatHandle {
    fn spawn(
        tx: mpsc::Sender<StreamEvent>,
        ids: Arc<EventIds>,
        current_day: Arc<AtomicU32>,
        total_days: u32,
        period: Duration,
        token: CancellationToken,
    ) -> Self {
        let loop_token = token.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; swallow it.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = interval.tick() => {
                        let day_number = current_day.load(Ordering::Relaxed);
                        let event = StreamEvent::Progress {
                            id: ids.next_progress(),
                            day_number,
                            total_days,
                            percent: percent_done(day_number.saturating_sub(1), total_days),
                            status: "heartbeat".to_string(),
                        };
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self { token, task }
    }

    /// Cancel the heartbeat and wait for it to finish, so an in-flight
    /// heartbeat send can never land after the terminal event.
    async fn shutdown(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}

fn percent_done(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Why the driver stopped early.
enum Interrupt {
    /// Cancellation observed; report partial results.
    Cancelled,
    /// A generation budget ceiling was hit; terminal.
    Budget(BudgetExceeded),
    /// The consumer dropped the stream; nothing left to tell anyone.
    Disconnected,
}

impl From<BudgetExceeded> for Interrupt {
    fn from(e: BudgetExceeded) -> Self {
        Self::Budget(e)
    }
}

/// All state for one run. Owned exclusively by the driver task.
struct RunDriver {
    run_id: Uuid,
    request: GenerationRequest,
    config: EngineConfig,
    provider: Arc<dyn DayProvider>,
    sink: Arc<dyn PersistSink>,
    enricher: Option<Arc<dyn PlaceEnricher>>,
    tx: mpsc::Sender<StreamEvent>,
    ids: Arc<EventIds>,
    cancel: CancellationToken,
    current_day: Arc<AtomicU32>,
    guard: GenerationGuard,
    metrics: RunMetrics,
    days: Vec<Day>,
    used_keys: HashSet<String>,
    last_verdict: Option<CombinedVerdict>,
}

impl RunDriver {
    async fn run(mut self, resume: Option<ResumeState>, heartbeat: HeartbeatHandle) {
        let outcome = self.run_inner(resume).await;
        // Join the heartbeat before the terminal event so nothing trails it.
        heartbeat.shutdown().await;

        match outcome {
            Ok(()) => {
                self.emit_done(true).await;
            }
            Err(Interrupt::Cancelled) => {
                tracing::info!(run_id = %self.run_id, days = self.days.len(), "run cancelled, reporting partial result");
                self.emit_done(false).await;
            }
            Err(Interrupt::Budget(e)) => {
                tracing::warn!(run_id = %self.run_id, error = %e, "generation budget exceeded");
                self.metrics.exceeded = Some(e.kind);
                let event = StreamEvent::Error {
                    id: self.ids.next_error(),
                    message: e.to_string(),
                    recoverable: false,
                    partial_days: self.days.len() as u32,
                };
                let _ = self.tx.send(event).await;
            }
            Err(Interrupt::Disconnected) => {
                tracing::info!(run_id = %self.run_id, days = self.days.len(), "client disconnected, run aborted");
            }
        }
    }

    async fn run_inner(&mut self, resume: Option<ResumeState>) -> Result<(), Interrupt> {
        // Day-count ceiling first: a rejected run emits exactly one
        // non-recoverable error and nothing else.
        self.guard.check_day_count(self.request.num_days)?;

        let replay_after = self.seed_resume(resume);

        self.emit(StreamEvent::Meta {
            id: self.ids.meta(),
            run_id: self.run_id,
            destination: self.request.destination.clone(),
            total_days: self.request.num_days,
            start_date: self.request.start_date,
            resumed_days: self.days.len() as u32,
        })
        .await?;

        // Replay pre-existing days the consumer has not seen yet.
        for day in self.days.clone() {
            if replay_after.is_some_and(|last| day.day_number <= last) {
                continue;
            }
            self.emit(StreamEvent::Day {
                id: self.ids.day(day.day_number),
                day,
                cached: true,
                refined: false,
            })
            .await?;
        }

        let total = self.request.num_days;
        let first_new = self.days.len() as u32 + 1;

        for day_number in first_new..=total {
            if self.cancel.is_cancelled() {
                return Err(Interrupt::Cancelled);
            }
            self.guard.check()?;

            self.current_day.store(day_number, Ordering::Relaxed);
            self.emit(StreamEvent::Progress {
                id: self.ids.next_progress(),
                day_number,
                total_days: total,
                percent: percent_done(day_number - 1, total),
                status: format!("generating day {day_number}"),
            })
            .await?;

            let day = self.generate_one(day_number, None).await?;
            self.days.push(day.clone());
            self.metrics.days_generated += 1;
            self.persist(&day).await;
            self.emit(StreamEvent::Day {
                id: self.ids.day(day_number),
                day,
                cached: false,
                refined: false,
            })
            .await?;
        }

        if self.request.validation_enabled && !self.days.is_empty() {
            self.validate_and_refine().await?;
        }

        Ok(())
    }

    /// Seed run state from a resume payload. Returns the day number after
    /// which replay should start, if the consumer told us what it saw.
    fn seed_resume(&mut self, resume: Option<ResumeState>) -> Option<u32> {
        let resume = resume?;

        let mut days = resume.days;
        days.sort_by_key(|d| d.day_number);
        // Keep only the contiguous prefix 1..k; anything past a gap is
        // regenerated rather than trusted.
        let mut expected = 1u32;
        days.retain(|d| {
            let keep = d.day_number == expected;
            if keep {
                expected += 1;
            }
            keep
        });

        for day in &days {
            for activity in &day.activities {
                self.used_keys.insert(dedup::activity_key(activity));
            }
        }
        self.metrics.days_cached = days.len() as u32;
        self.current_day.store(days.len() as u32, Ordering::Relaxed);
        tracing::info!(
            run_id = %self.run_id,
            cached = days.len(),
            "resuming from partial state"
        );
        self.days = days;

        resume
            .last_event_id
            .as_deref()
            .and_then(ResumeCursor::parse)
            .and_then(|c| c.last_day())
    }

    /// Generate (or regenerate) one day: provider call, tolerant parse,
    /// dedup, optional enrichment.
    async fn generate_one(
        &mut self,
        day_number: u32,
        feedback: Option<String>,
    ) -> Result<Day, Interrupt> {
        let prior: Vec<String> = self
            .days
            .iter()
            .filter(|d| d.day_number != day_number)
            .map(generator::summarize_day)
            .collect();
        let prompt = DayPrompt::for_day(
            &self.request,
            day_number,
            self.request.daily_target(self.config.budget.buffer_fraction),
            prior,
            feedback,
        );

        if self.cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }

        self.guard.record_provider_call();
        self.metrics.provider_calls += 1;
        // Cancellation races the call: a mid-call cancel discards the
        // reply instead of persisting it, and a hung provider cannot pin
        // the run.
        let reply = tokio::select! {
            _ = self.cancel.cancelled() => return Err(Interrupt::Cancelled),
            reply = self.provider.generate(&prompt) => reply,
        };

        let date = self.request.date_of_day(day_number);
        let mut day = match reply {
            Ok(raw) => generator::parse_day_reply(&raw, day_number, date),
            Err(e) => {
                tracing::warn!(run_id = %self.run_id, day_number, error = %e, "provider call failed");
                Day::empty(day_number, date)
            }
        };

        if day.activities.is_empty() {
            // Recoverable: substitute the empty day, tell the consumer,
            // and keep going.
            self.metrics.recoverable_errors += 1;
            self.emit(StreamEvent::Error {
                id: self.ids.next_error(),
                message: format!("day {day_number} could not be generated; continuing with an empty day"),
                recoverable: true,
                partial_days: self.days.len() as u32,
            })
            .await?;
            return Ok(day);
        }

        let activities = std::mem::take(&mut day.activities);
        let (kept, new_keys) = dedup::filter_day(activities, &self.used_keys);
        day.activities = kept;
        self.used_keys.extend(new_keys);

        self.enrich(&mut day).await;
        Ok(day)
    }

    /// Best-effort enrichment and cost-confidence bookkeeping. Never
    /// blocks the loop: any failure skips the rest of the step.
    async fn enrich(&mut self, day: &mut Day) {
        if let Some(enricher) = &self.enricher {
            for activity in &mut day.activities {
                if let Err(e) = enricher.enrich(activity).await {
                    tracing::debug!(
                        enricher = enricher.name(),
                        activity = %activity.name,
                        error = %e,
                        "enrichment skipped"
                    );
                    break;
                }
            }
        }

        if self.request.cost_verification_enabled {
            let now = chrono::Utc::now();
            for activity in &day.activities {
                let confidence = cost_confidence(activity, &self.config.verification, now);
                tracing::debug!(
                    activity = %activity.name,
                    confidence = ?confidence,
                    "cost verification consumed"
                );
            }
        }
    }

    /// Persist one day best-effort; failures are logged, never fatal.
    async fn persist(&self, day: &Day) {
        if let Err(e) = self.sink.save_day(day, &self.days).await {
            tracing::warn!(
                run_id = %self.run_id,
                day_number = day.day_number,
                error = %e,
                "failed to persist day (best-effort)"
            );
        }
    }

    /// Validation/refinement loop: validate, regenerate flagged days with
    /// targeted feedback, re-validate, up to the iteration cap. After the
    /// cap the best available result stands.
    async fn validate_and_refine(&mut self) -> Result<(), Interrupt> {
        let profile = self.request.group_profile();
        let mut iteration = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Interrupt::Cancelled);
            }
            self.guard.check()?;

            let verdict = director::evaluate(
                Arc::new(self.days.clone()),
                self.request.total_budget,
                self.request.num_days,
                profile,
                self.config.budget.clone(),
                self.config.logistics.clone(),
                iteration,
            )
            .await;

            self.emit(StreamEvent::Validation {
                id: self.ids.next_validation(),
                iteration,
                budget_status: verdict.budget.status,
                logistics_status: verdict.logistics.status,
                flagged_days: verdict.flagged_days.clone(),
                log: verdict.log_tail(8),
            })
            .await?;

            let finished = verdict.status == OverallStatus::Approved
                || verdict.flagged_days.is_empty()
                || iteration >= MAX_REFINEMENT_ITERATIONS;
            if finished {
                if verdict.status != OverallStatus::Approved {
                    tracing::info!(
                        run_id = %self.run_id,
                        status = ?verdict.status,
                        iteration,
                        "accepting best-effort result at refinement cap"
                    );
                }
                self.last_verdict = Some(verdict);
                return Ok(());
            }

            let flagged = verdict.flagged_days.clone();
            self.emit(StreamEvent::Refinement {
                id: self.ids.next_refinement(),
                iteration: iteration + 1,
                days: flagged.clone(),
                reason: verdict.feedback.join(" "),
            })
            .await?;

            for day_number in flagged {
                if self.cancel.is_cancelled() {
                    self.last_verdict = Some(verdict);
                    return Err(Interrupt::Cancelled);
                }
                self.guard.check()?;

                // Release the outgoing day's dedup keys so the replacement
                // may legitimately reuse its own slots.
                if let Some(existing) = self.days.iter().find(|d| d.day_number == day_number) {
                    for activity in &existing.activities {
                        let key = activity
                            .dedup_key
                            .clone()
                            .unwrap_or_else(|| dedup::activity_key(activity));
                        self.used_keys.remove(&key);
                    }
                }

                let feedback = director::build_feedback(&verdict, day_number);
                let new_day = self.generate_one(day_number, Some(feedback)).await?;
                if let Some(slot) = self.days.iter_mut().find(|d| d.day_number == day_number) {
                    *slot = new_day.clone();
                }
                self.metrics.days_generated += 1;
                self.persist(&new_day).await;
                self.emit(StreamEvent::Day {
                    id: self.ids.day(day_number),
                    day: new_day,
                    cached: false,
                    refined: true,
                })
                .await?;
            }

            self.last_verdict = Some(verdict);
            iteration += 1;
        }
    }

    async fn emit_done(&mut self, finished_normally: bool) {
        let complete =
            finished_normally && self.days.len() as u32 == self.request.num_days;
        let total_activities: u32 = self
            .days
            .iter()
            .map(|d| d.activities.len() as u32)
            .sum();
        let event = StreamEvent::Done {
            id: self.ids.done(),
            total_days: self.days.len() as u32,
            total_activities,
            elapsed_ms: self.guard.elapsed().as_millis() as u64,
            complete,
            verdict: self.last_verdict.as_ref().map(VerdictSummary::from),
            metrics: self.metrics.clone(),
        };
        let _ = self.tx.send(event).await;
    }

    /// Send an event; a closed channel means the consumer is gone and the
    /// run should stop issuing provider calls.
    async fn emit(&self, event: StreamEvent) -> Result<(), Interrupt> {
        if self.tx.send(event).await.is_err() {
            self.cancel.cancel();
            return Err(Interrupt::Disconnected);
        }
        Ok(())
    }
}
