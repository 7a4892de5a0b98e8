//! Language model trait.
//!
//! The pipeline calls [`LanguageModel::generate`] exactly once per
//! question. Concrete clients (Ollama, OpenAI-compatible) live in the
//! `log-rag` app crate.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model identifier (e.g. `"llama3.2"`).
    fn model_name(&self) -> &str;

    /// Produce a complete (non-streamed) response to `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
