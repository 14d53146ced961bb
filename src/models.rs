//! Core data models used throughout the generation pipeline.
//!
//! These types represent the documents, chunks, and conversation state that
//! flow from ingestion through retrieval to BRD generation.

use std::path::PathBuf;

/// An assessment document after text extraction.
///
/// Created at ingestion and immutable for the rest of the pipeline run.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub source_path: PathBuf,
    pub raw_text: String,
}

/// A bounded-length segment of one document's text.
///
/// Consecutive chunks of the same document overlap by the profile's
/// `overlap` characters; `char_span` is measured in characters (not bytes)
/// so multi-byte input never splits a code point. Chunk order equals
/// `char_span.0` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub document_id: String,
    pub sequence_index: usize,
    pub text: String,
    /// Half-open `[start, end)` character offsets into the source document.
    pub char_span: (usize, usize),
}

/// A chunk paired with its embedding vector.
///
/// All vectors in one store share a single dimension, fixed by the
/// embedding provider that produced them.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A retrieved chunk with its similarity to the query.
///
/// Result order follows the retrieval strategy's ranking, which for MMR is
/// not necessarily raw similarity order.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Outcome of the validation agent for one generated BRD.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub report: String,
}

/// Per-session conversation context for generate/refine.
///
/// Owned by the caller (one instance per session) and passed explicitly
/// into the agents — never shared global state. `generate` sets both
/// fields; `refine` reads both and rewrites `current_brd`.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub current_assessment: Option<String>,
    pub current_brd: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }
}
