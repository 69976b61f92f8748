//! Core engine for validated multi-day itinerary generation.
//!
//! The pipeline: a [`provider::DayProvider`] drafts one day at a time
//! from prompts built by [`generator`], the [`dedup`] pass removes
//! repeated activities, the [`director`] runs the budget and logistics
//! validators and drives bounded refinement, and the
//! [`orchestrator::Engine`] sequences it all into an ordered
//! [`event::StreamEvent`] stream with resume, cancellation, and
//! heartbeat support. [`guard::GenerationGuard`] caps what one run may
//! consume.

pub mod config;
pub mod dedup;
pub mod director;
pub mod enrich;
pub mod event;
pub mod generator;
pub mod guard;
pub mod model;
pub mod orchestrator;
pub mod persist;
pub mod provider;
pub mod validator;

pub use config::EngineConfig;
pub use event::{EventIds, ResumeCursor, StreamEvent};
pub use guard::{BudgetExceeded, BudgetKind, GenerationGuard, GuardConfig};
pub use model::{Activity, Day, GenerationRequest, RunMetrics};
pub use orchestrator::{Engine, ResumeState, RunStream};
pub use persist::{NullSink, PersistSink};
pub use provider::{DayProvider, ProviderError};
