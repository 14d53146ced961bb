//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete HTTP backends:
//! - **[`OllamaEmbedder`]** — a local Ollama instance's `/api/embed` endpoint.
//! - **[`OpenAiEmbedder`]** — the OpenAI embeddings API.
//! - **[`HuggingFaceEmbedder`]** — the HuggingFace Inference API
//!   feature-extraction pipeline.
//! - **[`DisabledEmbedder`]** — always errors; for configurations that never index.
//!
//! The model identifier and dimensionality a provider reports are persisted
//! as vector-store metadata and re-checked on load and search, so a store
//! can never be silently queried with vectors from a different model.
//!
//! # Retry Strategy
//!
//! Transient errors use exponential backoff:
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::EmbeddingConfig;
use crate::error::{BrdError, Result};

/// Maps text to fixed-dimension vectors.
///
/// One provider instance embeds with exactly one model; `model_name` and
/// `dims` are the identity recorded in store metadata.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"mxbai-embed-large"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality; identical for every vector this provider returns.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Instantiate the provider named by the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        "huggingface" => Ok(Box::new(HuggingFaceEmbedder::new(config)?)),
        other => Err(BrdError::Config(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

fn required_model(config: &EmbeddingConfig) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| BrdError::Config("embedding.model is required".to_string()))
}

fn required_dims(config: &EmbeddingConfig) -> Result<usize> {
    config
        .dims
        .ok_or_else(|| BrdError::Config("embedding.dims is required".to_string()))
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| BrdError::EmbeddingServiceFailure(e.to_string()))
}

/// POST a JSON body, retrying 429/5xx and network errors with exponential
/// backoff. Non-429 client errors fail immediately.
async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err: Option<String> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut req = client.post(url).json(body);
        if let Some(token) = bearer {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        match req.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| BrdError::EmbeddingServiceFailure(e.to_string()));
                }
                let text = response.text().await.unwrap_or_default();
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    last_err = Some(format!("{} {}: {}", url, status, text));
                    continue;
                }
                return Err(BrdError::EmbeddingServiceFailure(format!(
                    "{} {}: {}",
                    url, status, text
                )));
            }
            Err(e) => {
                last_err = Some(e.to_string());
                continue;
            }
        }
    }

    Err(BrdError::EmbeddingServiceFailure(
        last_err.unwrap_or_else(|| "embedding request failed after retries".to_string()),
    ))
}

fn parse_vector_array(value: &serde_json::Value) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| {
            BrdError::EmbeddingServiceFailure("embedding is not an array".to_string())
        })
        .map(|arr| arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}

// ============ Disabled ============

/// Always errors; selected when `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingProvider for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(BrdError::Config(
            "embedding provider is disabled; set [embedding] provider to index documents"
                .to_string(),
        ))
    }
}

// ============ Ollama ============

/// `POST {url}/api/embed` against a local Ollama instance.
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            model: required_model(config)?,
            dims: required_dims(config)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let url = format!("{}/api/embed", self.url);
        let json = post_json_with_retry(&self.client, &url, None, &body, self.max_retries).await?;

        json.get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                BrdError::EmbeddingServiceFailure(
                    "invalid Ollama response: missing embeddings array".to_string(),
                )
            })?
            .iter()
            .map(parse_vector_array)
            .collect()
    }
}

// ============ OpenAI ============

/// `POST https://api.openai.com/v1/embeddings`; needs `OPENAI_API_KEY`.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(BrdError::Config(
                "OPENAI_API_KEY environment variable not set".to_string(),
            ));
        }
        Ok(Self {
            model: required_model(config)?,
            dims: required_dims(config)?,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| BrdError::Config("OPENAI_API_KEY not set".to_string()))?;
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let json = post_json_with_retry(
            &self.client,
            "https://api.openai.com/v1/embeddings",
            Some(&api_key),
            &body,
            self.max_retries,
        )
        .await?;

        json.get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| {
                BrdError::EmbeddingServiceFailure(
                    "invalid OpenAI response: missing data array".to_string(),
                )
            })?
            .iter()
            .map(|item| {
                item.get("embedding").map(parse_vector_array).unwrap_or_else(|| {
                    Err(BrdError::EmbeddingServiceFailure(
                        "invalid OpenAI response: missing embedding".to_string(),
                    ))
                })
            })
            .collect()
    }
}

// ============ HuggingFace ============

/// The HuggingFace Inference API feature-extraction pipeline; needs `HF_TOKEN`.
pub struct HuggingFaceEmbedder {
    model: String,
    dims: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl HuggingFaceEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if std::env::var("HF_TOKEN").is_err() {
            return Err(BrdError::Config(
                "HF_TOKEN environment variable not set".to_string(),
            ));
        }
        Ok(Self {
            model: required_model(config)?,
            dims: required_dims(config)?,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let token = std::env::var("HF_TOKEN")
            .map_err(|_| BrdError::Config("HF_TOKEN not set".to_string()))?;
        let url = format!(
            "https://api-inference.huggingface.co/pipeline/feature-extraction/{}",
            self.model
        );
        let body = serde_json::json!({ "inputs": texts, "options": { "wait_for_model": true } });
        let json =
            post_json_with_retry(&self.client, &url, Some(&token), &body, self.max_retries).await?;

        json.as_array()
            .ok_or_else(|| {
                BrdError::EmbeddingServiceFailure(
                    "invalid HuggingFace response: expected array of vectors".to_string(),
                )
            })?
            .iter()
            .map(parse_vector_array)
            .collect()
    }
}

// ============ Vector utilities ============

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`] back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_parse_vector_array() {
        let value = serde_json::json!([0.25, -1.0, 2.0]);
        assert_eq!(parse_vector_array(&value).unwrap(), vec![0.25, -1.0, 2.0]);
        assert!(parse_vector_array(&serde_json::json!("nope")).is_err());
    }

    #[test]
    fn test_disabled_embedder_errors() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let err = rt
            .block_on(DisabledEmbedder.embed(&["text".to_string()]))
            .unwrap_err();
        assert!(matches!(err, BrdError::Config(_)));
    }
}
