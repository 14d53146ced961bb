//! Typed error taxonomy for the generation pipeline.
//!
//! The batch pipeline treats most of these as per-document failures (log and
//! continue); the interactive session surfaces the full chain to the caller.
//! A BRD rejected by validation is deliberately not represented here — it is
//! a normal pipeline outcome, not an error.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the ingestion, indexing, and generation stages.
#[derive(Debug, Error)]
pub enum BrdError {
    /// File extension is not one of the accepted assessment formats.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Reading or parsing the underlying file failed.
    #[error("text extraction failed for {path}: {detail}")]
    ExtractionFailure { path: PathBuf, detail: String },

    /// The persisted store was built with a different embedding model than
    /// the one currently configured. Searching across models would produce
    /// garbage distances, so this is rejected outright.
    #[error("vector store was built with embedding model '{stored}' but '{configured}' is configured")]
    EmbeddingModelMismatch { stored: String, configured: String },

    /// No persisted store at the given location.
    #[error("no vector store found at {0}")]
    StoreNotFound(PathBuf),

    /// The embedding service errored or timed out after all retries.
    #[error("embedding service failure: {0}")]
    EmbeddingServiceFailure(String),

    /// The text completion service errored or timed out after all retries.
    #[error("generation service failure: {0}")]
    GenerationServiceFailure(String),

    /// `refine` was called before any BRD was generated in this session.
    #[error("no existing BRD to refine")]
    RefineWithoutPriorState,

    /// Configuration value rejected at load or construction time.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("vector store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrdError>;

/// Render an error and its source chain on one line.
///
/// Used at the interactive boundary, which reports the raw failure text as
/// its output rather than aborting.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = BrdError::Io(io);
        assert!(error_chain(&err).contains("missing"));
    }

    #[test]
    fn test_mismatch_message_names_both_models() {
        let err = BrdError::EmbeddingModelMismatch {
            stored: "model-a".to_string(),
            configured: "model-b".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("model-a") && msg.contains("model-b"));
    }
}
