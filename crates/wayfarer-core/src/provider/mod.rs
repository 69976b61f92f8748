//! The `DayProvider` trait -- the adapter interface for generative text
//! providers.
//!
//! The provider is an untrusted external collaborator: it receives a
//! prompt and returns raw text which [`crate::generator::parse_day_reply`]
//! turns into a structured day. The trait is object-safe so engines can
//! hold a `Arc<dyn DayProvider>`.

use async_trait::async_trait;

use crate::generator::DayPrompt;

/// Errors from a provider call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider timed out after {0}s")]
    Timeout(u64),

    #[error("provider is unavailable: {0}")]
    Unavailable(String),
}

/// Adapter interface for a generative text provider.
///
/// Implementors wrap a specific backend (an HTTP completion API, a local
/// model, a scripted test double) and return the raw reply text. The
/// reply is treated as untrusted; callers must parse defensively.
#[async_trait]
pub trait DayProvider: Send + Sync {
    /// Human-readable name for this provider (e.g. "openai-compatible").
    fn name(&self) -> &str;

    /// Generate one day's plan for the given prompt context.
    async fn generate(&self, prompt: &DayPrompt) -> Result<String, ProviderError>;
}

// Compile-time assertion: DayProvider must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn DayProvider) {}
};
