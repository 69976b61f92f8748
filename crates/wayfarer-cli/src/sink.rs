//! File-backed persistence: rewrites the full itinerary JSON after each
//! day so a crash or disconnect leaves a resumable file behind.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;

use wayfarer_core::model::Day;
use wayfarer_core::persist::PersistSink;

pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PersistSink for JsonFileSink {
    async fn save_day(&self, _day: &Day, all_days: &[Day]) -> anyhow::Result<()> {
        let path = self.path.clone();
        let days = all_days.to_vec();
        tokio::task::spawn_blocking(move || write_itinerary(&path, &days))
            .await
            .context("itinerary write task failed")?
    }
}

/// Write via a sibling temp file and rename, so readers never observe a
/// half-written itinerary.
fn write_itinerary(path: &Path, days: &[Day]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(days).context("failed to serialize itinerary")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move itinerary into place at {}", path.display()))?;
    Ok(())
}

/// Read days back from a file written by [`JsonFileSink`].
pub fn read_itinerary(path: &Path) -> anyhow::Result<Vec<Day>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read itinerary at {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse itinerary at {}", path.display()))
}
