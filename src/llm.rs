//! Text completion client abstraction and implementations.
//!
//! Every generation agent goes through the narrow
//! [`CompletionClient::complete`] seam: a message sequence plus sampling
//! parameters in, plain text out. Backends:
//! - **[`MistralClient`]** — the Mistral chat completions API.
//! - **[`HuggingFaceClient`]** — the HuggingFace Inference API
//!   text-generation task (messages are flattened into a single prompt).
//! - **[`OllamaClient`]** — a local Ollama instance's `/api/chat` endpoint.
//!
//! Retry uses the same strategy as the embedding providers (429/5xx and
//! network errors retried with exponential backoff, other 4xx immediate),
//! except `max_retries` defaults to 0 — agent calls do not retry unless
//! configured to.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::GenerationConfig;
use crate::error::{BrdError, Result};

/// Sampling parameters forwarded to the completion service.
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    pub model: String,
    pub temperature: f32,
    pub top_k: u32,
    pub repetition_penalty: f32,
    pub max_new_tokens: u32,
}

impl SamplingConfig {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            top_k: config.top_k,
            repetition_penalty: config.repetition_penalty,
            max_new_tokens: config.max_new_tokens,
        }
    }
}

/// One turn of a completion request.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// `"system"`, `"user"`, or `"assistant"`.
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

/// Opaque text-generation collaborator behind one method.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], sampling: &SamplingConfig)
        -> Result<String>;
}

/// Instantiate the client named by the configuration.
pub fn create_client(config: &GenerationConfig) -> Result<Box<dyn CompletionClient>> {
    match config.provider.as_str() {
        "mistral" => Ok(Box::new(MistralClient::new(config)?)),
        "huggingface" => Ok(Box::new(HuggingFaceClient::new(config)?)),
        "ollama" => Ok(Box::new(OllamaClient::new(config)?)),
        other => Err(BrdError::Config(format!(
            "unknown generation provider: {}",
            other
        ))),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| BrdError::GenerationServiceFailure(e.to_string()))
}

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
                        .map_err(|e| BrdError::GenerationServiceFailure(e.to_string()));
                }
                let text = response.text().await.unwrap_or_default();
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    last_err = Some(format!("{} {}: {}", url, status, text));
                    continue;
                }
                return Err(BrdError::GenerationServiceFailure(format!(
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

    Err(BrdError::GenerationServiceFailure(
        last_err.unwrap_or_else(|| "completion request failed after retries".to_string()),
    ))
}

/// Flatten a message sequence into one role-prefixed prompt for backends
/// that take plain text instead of chat turns.
fn flatten_messages(messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    for msg in messages {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        match msg.role {
            "system" => out.push_str(&msg.content),
            role => {
                out.push_str(role);
                out.push_str(": ");
                out.push_str(&msg.content);
            }
        }
    }
    out
}

// ============ Mistral ============

/// `POST https://api.mistral.ai/v1/chat/completions`; needs `MISTRAL_API_KEY`.
pub struct MistralClient {
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl MistralClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        if std::env::var("MISTRAL_API_KEY").is_err() {
            return Err(BrdError::Config(
                "MISTRAL_API_KEY environment variable not set".to_string(),
            ));
        }
        Ok(Self {
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.mistral.ai/v1/chat/completions".to_string()),
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionClient for MistralClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        sampling: &SamplingConfig,
    ) -> Result<String> {
        let api_key = std::env::var("MISTRAL_API_KEY")
            .map_err(|_| BrdError::Config("MISTRAL_API_KEY not set".to_string()))?;

        let body = serde_json::json!({
            "model": sampling.model,
            "temperature": sampling.temperature,
            "max_tokens": sampling.max_new_tokens,
            "messages": messages
                .iter()
                .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
                .collect::<Vec<_>>(),
        });

        let json =
            post_json_with_retry(&self.client, &self.url, Some(&api_key), &body, self.max_retries)
                .await?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                BrdError::GenerationServiceFailure(
                    "invalid Mistral response: missing message content".to_string(),
                )
            })
    }
}

// ============ HuggingFace ============

/// The HuggingFace Inference API text-generation task; needs `HF_TOKEN`.
pub struct HuggingFaceClient {
    max_retries: u32,
    client: reqwest::Client,
}

impl HuggingFaceClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        if std::env::var("HF_TOKEN").is_err() {
            return Err(BrdError::Config(
                "HF_TOKEN environment variable not set".to_string(),
            ));
        }
        Ok(Self {
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionClient for HuggingFaceClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        sampling: &SamplingConfig,
    ) -> Result<String> {
        let token = std::env::var("HF_TOKEN")
            .map_err(|_| BrdError::Config("HF_TOKEN not set".to_string()))?;
        let url = format!(
            "https://api-inference.huggingface.co/models/{}",
            sampling.model
        );
        let body = serde_json::json!({
            "inputs": flatten_messages(messages),
            "parameters": {
                "temperature": sampling.temperature,
                "top_k": sampling.top_k,
                "repetition_penalty": sampling.repetition_penalty,
                "max_new_tokens": sampling.max_new_tokens,
                "return_full_text": false,
            },
            "options": { "wait_for_model": true },
        });

        let json =
            post_json_with_retry(&self.client, &url, Some(&token), &body, self.max_retries).await?;

        json.pointer("/0/generated_text")
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                BrdError::GenerationServiceFailure(
                    "invalid HuggingFace response: missing generated_text".to_string(),
                )
            })
    }
}

// ============ Ollama ============

/// `POST {url}/api/chat` against a local Ollama instance.
pub struct OllamaClient {
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
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
impl CompletionClient for OllamaClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        sampling: &SamplingConfig,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": sampling.model,
            "stream": false,
            "messages": messages
                .iter()
                .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
                .collect::<Vec<_>>(),
            "options": {
                "temperature": sampling.temperature,
                "top_k": sampling.top_k,
                "repeat_penalty": sampling.repetition_penalty,
                "num_predict": sampling.max_new_tokens,
            },
        });

        let url = format!("{}/api/chat", self.url);
        let json = post_json_with_retry(&self.client, &url, None, &body, self.max_retries).await?;

        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                BrdError::GenerationServiceFailure(
                    "invalid Ollama response: missing message content".to_string(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_messages_prefixes_roles() {
        let messages = vec![
            ChatMessage::system("Be terse."),
            ChatMessage::user("Hello"),
            ChatMessage::assistant("Hi"),
            ChatMessage::user("Bye"),
        ];
        let prompt = flatten_messages(&messages);
        assert!(prompt.starts_with("Be terse."));
        assert!(prompt.contains("user: Hello"));
        assert!(prompt.contains("assistant: Hi"));
        assert!(prompt.ends_with("user: Bye"));
    }

    #[test]
    fn test_sampling_config_from_generation_config() {
        let config = GenerationConfig {
            provider: "mistral".to_string(),
            model: "mistral-large-latest".to_string(),
            url: None,
            temperature: 0.3,
            top_k: 30,
            repetition_penalty: 1.03,
            max_new_tokens: 512,
            max_retries: 0,
            timeout_secs: 120,
        };
        let sampling = SamplingConfig::from_config(&config);
        assert_eq!(sampling.model, "mistral-large-latest");
        assert_eq!(sampling.top_k, 30);
        assert!((sampling.repetition_penalty - 1.03).abs() < 1e-6);
    }
}
