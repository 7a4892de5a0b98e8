//! Deterministic stand-ins for external services.
//!
//! Compiled for this crate's unit tests only. Real embedding is available
//! offline through [`HashingProvider`](crate::embedding::HashingProvider).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::{EmbeddingProvider, HashingProvider};
use crate::llm::LanguageModel;

/// Embedder that succeeds for the first `ok_calls` requests, then fails.
pub struct FailingEmbedder {
    ok_calls: usize,
    calls: AtomicUsize,
    inner: HashingProvider,
}

impl FailingEmbedder {
    pub fn always() -> Self {
        Self::after(0)
    }

    pub fn after(ok_calls: usize) -> Self {
        Self {
            ok_calls,
            calls: AtomicUsize::new(0),
            inner: HashingProvider::new(64),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.ok_calls {
            bail!("connection refused");
        }
        self.inner.embed(texts).await
    }
}

/// Language model that records every prompt and replies with a fixed text.
pub struct RecordingModel {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(self.reply.clone())
    }
}

/// Language model whose every call fails.
pub struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("model not loaded")
    }
}
