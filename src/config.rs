use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub store: StoreConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub few_shot: FewShotConfig,
}

/// A `(max_size, overlap)` chunking pair, in characters.
///
/// The two pipeline paths tune these independently: the LLM-assisted
/// extraction path and vector-store indexing use different profiles.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkProfile {
    pub max_size: usize,
    pub overlap: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_extraction_profile")]
    pub extraction: ChunkProfile,
    #[serde(default = "default_indexing_profile")]
    pub indexing: ChunkProfile,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            extraction: default_extraction_profile(),
            indexing: default_indexing_profile(),
        }
    }
}

fn default_extraction_profile() -> ChunkProfile {
    ChunkProfile {
        max_size: 500,
        overlap: 50,
    }
}

fn default_indexing_profile() -> ChunkProfile {
    ChunkProfile {
        max_size: 512,
        overlap: 128,
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embed_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    /// Agent calls do not retry by default; raise this to tolerate flaky
    /// completion services.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.3
}
fn default_top_k() -> u32 {
    30
}
fn default_repetition_penalty() -> f32 {
    1.03
}
fn default_max_new_tokens() -> u32 {
    1024
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    /// MMR relevance/diversity weight. `1.0` is plain top-k by similarity.
    #[serde(default = "default_lambda")]
    pub lambda: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            lambda: default_lambda(),
        }
    }
}

fn default_k() -> usize {
    5
}
fn default_lambda() -> f32 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Persistence directory. Present-and-non-empty means "already built"
    /// and the pipeline loads instead of rebuilding — use distinct
    /// directories per distinct document set.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// Directory where generated BRDs are written.
    pub dir: PathBuf,
    /// Fixed filename overwritten on each interactive refinement.
    #[serde(default = "default_interactive_filename")]
    pub interactive_filename: String,
}

fn default_interactive_filename() -> String {
    "refined_brd.txt".to_string()
}

/// One few-shot example: a sample assessment with its finished BRD.
#[derive(Debug, Deserialize, Clone)]
pub struct FewShotPair {
    pub assessment: PathBuf,
    pub brd: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FewShotConfig {
    #[serde(default)]
    pub pairs: Vec<FewShotPair>,
    /// Total characters of example text included in a generation prompt.
    /// Examples are taken in order until the budget is spent.
    #[serde(default = "default_example_char_budget")]
    pub example_char_budget: usize,
}

impl Default for FewShotConfig {
    fn default() -> Self {
        Self {
            pairs: Vec::new(),
            example_char_budget: default_example_char_budget(),
        }
    }
}

fn default_example_char_budget() -> usize {
    24_000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    for (name, profile) in [
        ("chunking.extraction", &config.chunking.extraction),
        ("chunking.indexing", &config.chunking.indexing),
    ] {
        if profile.max_size == 0 {
            anyhow::bail!("{}.max_size must be > 0", name);
        }
        if profile.overlap >= profile.max_size {
            anyhow::bail!("{}.overlap must be < max_size", name);
        }
    }

    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.lambda) {
        anyhow::bail!("retrieval.lambda must be in [0.0, 1.0]");
    }

    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "huggingface" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or huggingface.",
            other
        ),
    }

    if config.generation.model.trim().is_empty() {
        anyhow::bail!("generation.model must not be empty");
    }
    match config.generation.provider.as_str() {
        "mistral" | "huggingface" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be mistral, huggingface, or ollama.",
            other
        ),
    }

    Ok(())
}
