//! Role-specialized generation agents.
//!
//! Four stateless prompt/response functions over a [`CompletionClient`]:
//! extract, generate, refine, and validate. Each is defined by its prompt
//! template and the shape of output it expects; none of them holds state —
//! the caller owns the [`ConversationState`] that `generate` and `refine`
//! mutate.

use std::path::PathBuf;

use tracing::warn;

use crate::chunk;
use crate::config::{ChunkProfile, FewShotConfig};
use crate::error::{BrdError, Result};
use crate::extract;
use crate::llm::{ChatMessage, CompletionClient, SamplingConfig};
use crate::models::{ConversationState, Document, ValidationResult};

/// The ten standard BRD sections every generated document must cover.
pub const BRD_SECTIONS: [&str; 10] = [
    "1. Executive Summary",
    "2. Project Scope",
    "3. Business Requirements",
    "4. Functional Requirements",
    "5. Non-Functional Requirements",
    "6. Constraints and Assumptions",
    "7. Stakeholder Requirements",
    "8. High-Level Solution Architecture",
    "9. Risk Analysis",
    "10. Acceptance Criteria",
];

/// A paired sample assessment and its finished BRD, inserted verbatim into
/// generation prompts to steer style and structure.
#[derive(Debug, Clone)]
pub struct FewShotExample {
    pub assessment: String,
    pub brd: String,
}

impl FewShotExample {
    fn rendered_len(&self) -> usize {
        self.assessment.chars().count() + self.brd.chars().count()
    }
}

/// Decides whether a validation report accepts its BRD.
///
/// The default treats any non-empty report as acceptance — a weak
/// heuristic inherited from the system this replaces, kept pluggable
/// rather than silently strengthened.
pub trait ValidationPolicy: Send + Sync {
    fn accept(&self, report: &str) -> bool;
}

/// `is_valid` = report is non-empty after trimming.
pub struct NonEmptyReport;

impl ValidationPolicy for NonEmptyReport {
    fn accept(&self, report: &str) -> bool {
        !report.trim().is_empty()
    }
}

/// The agent set for one generator: shared completion client, sampling
/// parameters, loaded few-shot examples, and the validation policy.
pub struct BrdAgents {
    client: Box<dyn CompletionClient>,
    sampling: SamplingConfig,
    few_shot: Vec<FewShotExample>,
    example_char_budget: usize,
    policy: Box<dyn ValidationPolicy>,
}

impl BrdAgents {
    pub fn new(client: Box<dyn CompletionClient>, sampling: SamplingConfig) -> Self {
        Self {
            client,
            sampling,
            few_shot: Vec::new(),
            example_char_budget: FewShotConfig::default().example_char_budget,
            policy: Box::new(NonEmptyReport),
        }
    }

    pub fn with_validation_policy(mut self, policy: Box<dyn ValidationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_example_char_budget(mut self, budget: usize) -> Self {
        self.example_char_budget = budget;
        self
    }

    /// Load few-shot examples from `(assessment, brd)` document pairs.
    ///
    /// A pair whose extraction fails is reported and skipped; the rest
    /// still load. Returns the number of examples loaded.
    pub fn load_few_shot_examples(&mut self, pairs: &[(PathBuf, PathBuf)]) -> usize {
        for (assessment_path, brd_path) in pairs {
            let assessment = match extract::extract_document(assessment_path) {
                Ok(doc) => doc.raw_text,
                Err(e) => {
                    warn!(path = %assessment_path.display(), error = %e, "skipping few-shot pair");
                    continue;
                }
            };
            let brd = match extract::extract_document(brd_path) {
                Ok(doc) => doc.raw_text,
                Err(e) => {
                    warn!(path = %brd_path.display(), error = %e, "skipping few-shot pair");
                    continue;
                }
            };
            self.few_shot.push(FewShotExample { assessment, brd });
        }
        self.few_shot.len()
    }

    pub fn set_examples(&mut self, examples: Vec<FewShotExample>) {
        self.few_shot = examples;
    }

    /// Extraction agent: pull the key-information taxonomy out of
    /// retrieved document context.
    pub async fn extract_key_info(&self, document_context: &str) -> Result<String> {
        let prompt = format!(
            "Extract the following key information from the document:\n\
             1. Business Objectives\n\
             2. Functional Requirements\n\
             3. Non-Functional Requirements\n\
             4. Constraints and Limitations\n\n\
             Document Context: {}\n\n\
             Extracted Information:",
            document_context
        );
        self.client
            .complete(&[ChatMessage::user(prompt)], &self.sampling)
            .await
    }

    /// LLM-assisted assessment summary over the whole cleaned document.
    ///
    /// Chunks with the extraction profile (not the indexing profile), joins
    /// the cleaned pieces, and asks for the assessment-report taxonomy.
    pub async fn summarize_assessment(
        &self,
        document: &Document,
        profile: &ChunkProfile,
    ) -> Result<String> {
        let pieces: Vec<String> = chunk::split(document, profile)
            .into_iter()
            .map(|c| c.text)
            .collect();
        let content = extract::clean_text(&pieces.join("\n"));

        let prompt = format!(
            "You are a specialist in reading assessment reports.\n\
             Extract the following key information from the assessment document.\n\
             1. Assessment Summary.\n\
             2. Observations and Suggestions for improvement.\n\
             3. Existing key issues and factors. Root cause of those issues and gaps.\n\
             4. Roadmap\n\n\
             Document Context: {}\n\n\
             Extracted Information:",
            content
        );
        self.client
            .complete(&[ChatMessage::user(prompt)], &self.sampling)
            .await
    }

    /// Generation agent: produce a BRD covering [`BRD_SECTIONS`] and record
    /// both the assessment and the result in `state`.
    pub async fn generate(
        &self,
        state: &mut ConversationState,
        assessment_text: &str,
    ) -> Result<String> {
        let mut prompt = String::new();

        let examples = self.budgeted_examples();
        if !examples.is_empty() {
            prompt.push_str("Use the following examples as a guide for generating the BRD:\n");
            for example in examples {
                prompt.push_str(&format!(
                    "\nSample Assessment Report:\n{}\n\n\
                     Corresponding Sample Business Requirements Document:\n{}\n",
                    example.assessment, example.brd
                ));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!(
            "You are an expert Business Requirements Document (BRD) generator.\n\n\
             Carefully analyze the following assessment report and generate a comprehensive BRD.\n\n\
             Key Guidelines:\n\
             - Use clear, concise, and professional language\n\
             - Directly reference the uploaded assessment report\n\
             - Ensure each standard section is thoroughly addressed\n\
             - Focus on specific, measurable requirements\n\n\
             Standard Sections to Include:\n{}\n\n\
             Assessment Report:\n{}\n\n\
             Generate a comprehensive Business Requirements Document:",
            BRD_SECTIONS.join("\n"),
            assessment_text
        ));

        let brd = self
            .client
            .complete(&[ChatMessage::user(prompt)], &self.sampling)
            .await?;

        state.current_assessment = Some(assessment_text.to_string());
        state.current_brd = Some(brd.clone());
        Ok(brd)
    }

    /// Refinement agent: a four-turn exchange over the prior assessment and
    /// BRD. Requires prior state; without it this is a defined error, and
    /// `state` is left untouched.
    pub async fn refine(
        &self,
        state: &mut ConversationState,
        feedback: &str,
    ) -> Result<String> {
        let (Some(assessment), Some(brd)) = (&state.current_assessment, &state.current_brd)
        else {
            return Err(BrdError::RefineWithoutPriorState);
        };

        let messages = [
            ChatMessage::system(
                "Refine the Business Requirements Document based on user feedback.",
            ),
            ChatMessage::user(format!("Original Assessment: {}", assessment)),
            ChatMessage::assistant(format!(
                "Here is the current version of the Business Requirements Document (BRD). \
                 Please update it based on the feedback. {}",
                brd
            )),
            ChatMessage::user(format!("Feedback to incorporate: {}", feedback)),
        ];

        let refined = self.client.complete(&messages, &self.sampling).await?;
        state.current_brd = Some(refined.clone());
        Ok(refined)
    }

    /// Validation agent: cross-check the generated BRD against an excerpt
    /// of the original document. Acceptance is delegated to the configured
    /// [`ValidationPolicy`].
    pub async fn validate(
        &self,
        generated_brd: &str,
        original_excerpt: &str,
    ) -> Result<ValidationResult> {
        let prompt = format!(
            "Validate the following generated Business Requirement Document \
             against the original assessment document. Check for:\n\
             1. Semantic Consistency\n\
             2. Domain-Specific Accuracy\n\
             3. Completeness of Requirements\n\n\
             Generated BRD: {}\n\
             Original Document: {}\n\n\
             Validation Report:",
            generated_brd, original_excerpt
        );
        let report = self
            .client
            .complete(&[ChatMessage::user(prompt)], &self.sampling)
            .await?;

        Ok(ValidationResult {
            is_valid: self.policy.accept(&report),
            report,
        })
    }

    /// The ordered prefix of examples that fits the character budget.
    ///
    /// Examples past the budget are dropped from the tail, with a warning,
    /// so an oversized example library cannot blow the model context.
    fn budgeted_examples(&self) -> &[FewShotExample] {
        let mut total = 0usize;
        let mut fit = 0usize;
        for example in &self.few_shot {
            total += example.rendered_len();
            if total > self.example_char_budget {
                break;
            }
            fit += 1;
        }
        if fit < self.few_shot.len() {
            warn!(
                included = fit,
                dropped = self.few_shot.len() - fit,
                budget = self.example_char_budget,
                "few-shot examples exceed character budget"
            );
        }
        &self.few_shot[..fit]
    }
}
