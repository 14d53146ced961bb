//! # brdgen
//!
//! A retrieval-augmented pipeline that turns unstructured assessment
//! reports into structured Business Requirements Documents (BRDs).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌───────────────┐
//! │  PDF / DOCX  │──▶│ Chunk + Embed  │──▶│ Vector store  │
//! │  extraction  │   │                │   │ (SQLite)      │
//! └──────────────┘   └────────────────┘   └──────┬────────┘
//!                                               │ MMR
//!                                               ▼
//!                          ┌────────────────────────────────┐
//!                          │ extract → generate → validate  │
//!                          │        (agent chain)           │
//!                          └──────────────┬─────────────────┘
//!                                         ▼
//!                              persisted BRD artifacts
//! ```
//!
//! Two entry points share the components: the batch [`pipeline`], which
//! isolates per-document failures, and the interactive [`session`], which
//! carries conversation state across generate/refine and surfaces failures
//! directly.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`error`] | Typed error taxonomy |
//! | [`extract`] | PDF/DOCX text extraction and cleanup |
//! | [`chunk`] | Overlapping fixed-size chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | SQLite-backed vector store |
//! | [`retrieve`] | Maximal-marginal-relevance retrieval |
//! | [`llm`] | Text completion client abstraction |
//! | [`agents`] | extract / generate / refine / validate agents |
//! | [`session`] | Interactive single-document session |
//! | [`pipeline`] | Batch orchestration |

pub mod agents;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod retrieve;
pub mod session;
pub mod store;
