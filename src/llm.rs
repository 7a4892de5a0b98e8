//! Language model clients.
//!
//! | Config Value | Client | Endpoint |
//! |-------------|--------|----------|
//! | `"disabled"` | [`DisabledModel`] | none |
//! | `"ollama"` | [`OllamaModel`] | `POST {url}/api/generate` with `stream: false` |
//! | `"openai"` | [`OpenAIModel`] | `POST {url}/chat/completions` (any OpenAI-compatible server) |
//!
//! Each question produces exactly one call; there is no retry.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub use log_rag_core::llm::LanguageModel;

use crate::config::{LlmConfig, DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_URL};
use crate::http;

pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("Language model is disabled; set [llm] provider in the config")
    }
}

pub struct OllamaModel {
    model: String,
    url: String,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for Ollama provider"))?;
        Ok(Self {
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            temperature: config.temperature,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["options"] = serde_json::json!({ "temperature": t });
        }
        let json = http::post_json(
            &self.client,
            &format!("{}/api/generate", self.url.trim_end_matches('/')),
            None,
            &body,
            0,
            "Ollama",
        )
        .await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
}

pub struct OpenAIModel {
    model: String,
    url: String,
    api_key: String,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl OpenAIModel {
    /// Requires `OPENAI_API_KEY` in the environment.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
            temperature: config.temperature,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        let json = http::post_json(
            &self.client,
            &format!("{}/chat/completions", self.url.trim_end_matches('/')),
            Some(&self.api_key),
            &body,
            0,
            "OpenAI",
        )
        .await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))
}

pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "ollama" => Ok(Arc::new(OllamaModel::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ollama_generate() {
        let json = serde_json::json!({"model": "llama3.2", "response": "3 errors", "done": true});
        assert_eq!(parse_ollama_response(&json).unwrap(), "3 errors");
        assert!(parse_ollama_response(&serde_json::json!({"done": true})).is_err());
    }

    #[test]
    fn parses_chat_completion() {
        let json = serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "none"}}]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "none");
        assert!(parse_chat_response(&serde_json::json!({"choices": []})).is_err());
    }

    #[tokio::test]
    async fn disabled_model_errors() {
        let model = create_model(&LlmConfig::default()).unwrap();
        assert!(model.generate("hi").await.is_err());
    }
}
