//! Persistence callback invoked after each generated or refined day.
//!
//! Storage is an external collaborator: the orchestrator calls the sink
//! best-effort and a failure never stops generation -- it is logged and
//! the run continues, exactly like any other recoverable fault.

use async_trait::async_trait;

use crate::model::Day;

/// Callback invoked with the new day and the full list so far.
#[async_trait]
pub trait PersistSink: Send + Sync {
    /// Persist one day. Errors are logged by the caller, never propagated.
    async fn save_day(&self, day: &Day, all_days: &[Day]) -> anyhow::Result<()>;
}

/// Sink that drops everything. Useful for previews and tests.
pub struct NullSink;

#[async_trait]
impl PersistSink for NullSink {
    async fn save_day(&self, _day: &Day, _all_days: &[Day]) -> anyhow::Result<()> {
        Ok(())
    }
}
