//! Interactive single-document session.
//!
//! One session owns one [`ConversationState`]: generate a BRD from a single
//! assessment file, then refine it repeatedly from feedback. Unlike the
//! batch pipeline, any failure here is fatal for the request — the caller
//! (the CLI boundary) formats the full error chain as the visible output,
//! which is deliberately debug-friendly.
//!
//! Saves overwrite one fixed filename per refinement, in contrast to the
//! batch pipeline's content-hash filenames.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::agents::BrdAgents;
use crate::config::ChunkProfile;
use crate::error::Result;
use crate::extract;
use crate::models::ConversationState;

/// Result of one generate or refine step.
#[derive(Debug, Clone)]
pub struct SessionOutput {
    pub brd: String,
    /// Assessment summary produced by the LLM-assisted extraction path.
    /// Present for generate, absent for refine.
    pub assessment_summary: Option<String>,
    pub saved_to: PathBuf,
}

pub struct InteractiveSession {
    agents: BrdAgents,
    state: ConversationState,
    extraction_profile: ChunkProfile,
    output_dir: PathBuf,
    filename: String,
}

impl InteractiveSession {
    pub fn new(
        agents: BrdAgents,
        extraction_profile: ChunkProfile,
        output_dir: PathBuf,
        filename: String,
    ) -> Self {
        Self {
            agents,
            state: ConversationState::new(),
            extraction_profile,
            output_dir,
            filename,
        }
    }

    /// Generate a BRD from one assessment file.
    ///
    /// Extraction failures are fatal here (single-request path), unlike the
    /// batch pipeline where they only skip the document.
    pub async fn generate_from_file(&mut self, path: &Path) -> Result<SessionOutput> {
        let document = extract::extract_document(path)?;
        let summary = self
            .agents
            .summarize_assessment(&document, &self.extraction_profile)
            .await?;
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::write(self.output_dir.join("assessment_summary.txt"), &summary)?;

        let brd = self.agents.generate(&mut self.state, &summary).await?;
        let saved_to = self.save(&brd)?;
        info!(path = %path.display(), saved_to = %saved_to.display(), "generated BRD");

        Ok(SessionOutput {
            brd,
            assessment_summary: Some(summary),
            saved_to,
        })
    }

    /// Refine the current BRD from feedback.
    ///
    /// Requires a prior `generate_from_file`; without one this returns
    /// the defined no-prior-state error and the session is unchanged.
    pub async fn refine(&mut self, feedback: &str) -> Result<SessionOutput> {
        let brd = self.agents.refine(&mut self.state, feedback).await?;
        let saved_to = self.save(&brd)?;
        info!(saved_to = %saved_to.display(), "refined BRD");

        Ok(SessionOutput {
            brd,
            assessment_summary: None,
            saved_to,
        })
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Write to the fixed interactive filename, overwriting the previous
    /// version.
    fn save(&self, brd: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(&self.filename);
        std::fs::write(&path, brd)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrdError;
    use crate::llm::{ChatMessage, CompletionClient, SamplingConfig};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct CannedClient(String);

    #[async_trait]
    impl CompletionClient for CannedClient {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _sampling: &SamplingConfig,
        ) -> crate::error::Result<String> {
            Ok(self.0.clone())
        }
    }

    fn session(dir: &Path, response: &str) -> InteractiveSession {
        let sampling = SamplingConfig {
            model: "m".to_string(),
            temperature: 0.1,
            top_k: 30,
            repetition_penalty: 1.0,
            max_new_tokens: 64,
        };
        InteractiveSession::new(
            BrdAgents::new(Box::new(CannedClient(response.to_string())), sampling),
            ChunkProfile {
                max_size: 500,
                overlap: 50,
            },
            dir.to_path_buf(),
            "refined_brd.txt".to_string(),
        )
    }

    #[tokio::test]
    async fn test_refine_before_generate_errors_and_leaves_state_clean() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path(), "brd");

        let err = session.refine("feedback").await.unwrap_err();
        assert!(matches!(err, BrdError::RefineWithoutPriorState));
        assert!(session.state().current_brd.is_none());
        assert!(!tmp.path().join("refined_brd.txt").exists());
    }

    #[tokio::test]
    async fn test_generate_from_missing_file_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut session = session(tmp.path(), "brd");

        let err = session
            .generate_from_file(Path::new("/nonexistent/report.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, BrdError::ExtractionFailure { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_fatal_interactively() {
        let tmp = TempDir::new().unwrap();
        let notes = tmp.path().join("notes.txt");
        std::fs::write(&notes, "plain text").unwrap();
        let mut session = session(tmp.path(), "brd");

        let err = session.generate_from_file(&notes).await.unwrap_err();
        assert!(matches!(err, BrdError::UnsupportedFormat(_)));
    }
}
