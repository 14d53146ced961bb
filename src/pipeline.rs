//! Batch pipeline orchestration.
//!
//! Coordinates the full run: ingestion → vector-store indexing (or cache
//! load) → per-document agent chain (extract → generate → validate) →
//! persistence. Documents are processed sequentially and failures are
//! isolated per document: one bad document is logged and skipped, never
//! aborting the batch. This is the opposite of the interactive session,
//! where any failure is fatal for the request.

use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::agents::BrdAgents;
use crate::chunk;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{BrdError, Result};
use crate::extract;
use crate::models::{ConversationState, Document, EmbeddedChunk, ScoredChunk};
use crate::retrieve::Retriever;
use crate::store::VectorStore;

/// A BRD that passed validation and was written to disk.
#[derive(Debug, Clone)]
pub struct PersistedBrd {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub brd: String,
}

/// Summary of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub generated: Vec<PersistedBrd>,
    /// Documents skipped at ingestion (unsupported extension or failed
    /// extraction).
    pub skipped_ingestion: usize,
    /// Documents whose BRD failed validation — a normal terminal state.
    pub rejected: usize,
    /// Documents that errored somewhere in the agent chain.
    pub failed: usize,
}

/// Load documents from paths, skipping the ones that cannot be ingested.
///
/// Unsupported extensions and extraction failures are warnings at batch
/// granularity; ingestion continues with the remaining paths. Returns the
/// loaded documents and the skip count.
pub fn load_documents(paths: &[PathBuf]) -> (Vec<Document>, usize) {
    let mut documents = Vec::new();
    let mut skipped = 0usize;

    for path in paths {
        match extract::extract_document(path) {
            Ok(doc) => documents.push(doc),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping document");
                skipped += 1;
            }
        }
    }

    (documents, skipped)
}

pub struct Pipeline {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    agents: BrdAgents,
}

impl Pipeline {
    pub fn new(config: Config, embedder: Arc<dyn EmbeddingProvider>, agents: BrdAgents) -> Self {
        Self {
            config,
            embedder,
            agents,
        }
    }

    /// Run the full batch over filesystem paths.
    pub async fn run(&self, paths: &[PathBuf]) -> Result<BatchReport> {
        let (documents, skipped) = load_documents(paths);
        let mut report = self.run_documents(documents).await?;
        report.skipped_ingestion += skipped;
        Ok(report)
    }

    /// Run the batch over already-loaded documents.
    pub async fn run_documents(&self, documents: Vec<Document>) -> Result<BatchReport> {
        let store = self.index_or_load(&documents).await?;
        let retriever = Retriever::new(store, Arc::clone(&self.embedder))?;

        let mut report = BatchReport::default();
        for document in &documents {
            match self.process_document(&retriever, document).await {
                Ok(Some(persisted)) => {
                    info!(
                        source = %persisted.source_path.display(),
                        output = %persisted.output_path.display(),
                        "generated BRD"
                    );
                    report.generated.push(persisted);
                }
                Ok(None) => {
                    warn!(source = %document.source_path.display(), "BRD validation failed, skipping document");
                    report.rejected += 1;
                }
                Err(e) => {
                    error!(source = %document.source_path.display(), error = %e, "error processing document");
                    report.failed += 1;
                }
            }
        }

        info!(
            generated = report.generated.len(),
            rejected = report.rejected,
            failed = report.failed,
            "batch complete"
        );
        Ok(report)
    }

    /// See [`index_or_load`].
    pub async fn index_or_load(&self, documents: &[Document]) -> Result<VectorStore> {
        index_or_load(&self.config, &self.embedder, documents).await
    }

    /// Extract → generate → validate for one document. `Ok(None)` means the
    /// BRD was rejected by validation.
    async fn process_document(
        &self,
        retriever: &Retriever,
        document: &Document,
    ) -> Result<Option<PersistedBrd>> {
        let retrieval = &self.config.retrieval;
        let query: String = document
            .raw_text
            .chars()
            .take(self.config.chunking.indexing.max_size)
            .collect();

        let retrieved = retriever
            .search(&query, retrieval.k, retrieval.lambda)
            .await?;
        let context = retrieval_context(&retrieved, document);

        let extracted = self.agents.extract_key_info(&context).await?;

        // Batch runs use a fresh conversation per document; only the
        // interactive session carries state across calls.
        let mut state = ConversationState::new();
        let brd = self.agents.generate(&mut state, &extracted).await?;

        let excerpt: String = document.raw_text.chars().take(2000).collect();
        let validation = self.agents.validate(&brd, &excerpt).await?;
        if !validation.is_valid {
            return Ok(None);
        }

        let output_path = self.persist(&retrieved, document, &brd)?;
        Ok(Some(PersistedBrd {
            source_path: document.source_path.clone(),
            output_path,
            brd,
        }))
    }

    /// Write the accepted BRD under a filename derived from the top
    /// retrieved chunk's content hash (deterministic per content).
    fn persist(
        &self,
        retrieved: &[ScoredChunk],
        document: &Document,
        brd: &str,
    ) -> Result<PathBuf> {
        let key_text = retrieved
            .first()
            .map(|sc| sc.chunk.text.as_str())
            .unwrap_or(document.raw_text.as_str());
        let filename = format!("BRD_{}.txt", content_hash(key_text));

        std::fs::create_dir_all(&self.config.output.dir)?;
        let path = self.config.output.dir.join(filename);
        std::fs::write(&path, brd)?;
        Ok(path)
    }
}

/// Load the store if the persistence location already holds one, otherwise
/// chunk + embed + build.
///
/// The existence check is presence-and-non-empty only; the cache is never
/// invalidated by content changes, so distinct document sets must use
/// distinct locations.
pub async fn index_or_load(
    config: &Config,
    embedder: &Arc<dyn EmbeddingProvider>,
    documents: &[Document],
) -> Result<VectorStore> {
    let location = &config.store.dir;

    if VectorStore::exists(location) {
        info!(location = %location.display(), "reusing existing vector store");
        return VectorStore::load(location, embedder.model_name()).await;
    }

    let profile = &config.chunking.indexing;
    let chunks: Vec<_> = documents
        .iter()
        .flat_map(|doc| chunk::split(doc, profile))
        .collect();

    // Embed everything before building: a failed batch aborts with no
    // partial store on disk.
    let mut embedded = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(config.embedding.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(BrdError::EmbeddingServiceFailure(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }
        for (chunk, vector) in batch.iter().zip(vectors) {
            embedded.push(EmbeddedChunk {
                chunk: chunk.clone(),
                vector,
            });
        }
    }

    info!(
        documents = documents.len(),
        chunks = embedded.len(),
        "building vector store"
    );
    VectorStore::build(location, embedder.model_name(), embedder.dims(), &embedded).await
}

fn retrieval_context(retrieved: &[ScoredChunk], document: &Document) -> String {
    if retrieved.is_empty() {
        return document.raw_text.clone();
    }
    retrieved
        .iter()
        .map(|sc| sc.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hex SHA-256 prefix used for artifact filenames.
fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Convenience for callers that already hold raw text.
pub fn document_from_text(path: impl Into<PathBuf>, text: &str) -> Document {
    Document {
        id: uuid::Uuid::new_v4().to_string(),
        source_path: path.into(),
        raw_text: extract::clean_text(text),
    }
}
