use std::time::Duration;

/// Failure taxonomy for the ingestion side of the engine.
///
/// Nothing in here is fatal: transient network failures are retried with
/// backoff, enrichment timeouts resolve to conservative defaults, and
/// malformed messages are dropped without touching connection health.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    #[error("enrichment lookup timed out after {0:?}")]
    EnrichmentTimeout(Duration),

    #[error("malformed feed message: {0}")]
    MalformedMessage(String),
}
