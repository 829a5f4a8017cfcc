//! Deterministic stand-ins for model providers, used by unit tests.

use crate::embed::{Embedder, Embedding};
use crate::generate::GenerationBackend;
use crate::provider::BackendError;
use crate::{Error, Result};

/// Embeds text as keyword counts over a fixed vocabulary.
pub struct KeywordEmbedder {
    vocab: Vec<&'static str>,
    /// Number of `embed_documents` calls made so far.
    pub calls: usize,
    /// Fail the n-th `embed_documents` call (0-based).
    pub fail_on_call: Option<usize>,
}

impl KeywordEmbedder {
    pub fn new(vocab: &[&'static str]) -> Self {
        Self {
            vocab: vocab.to_vec(),
            calls: 0,
            fail_on_call: None,
        }
    }

    pub fn vector(&self, text: &str) -> Embedding {
        let text = text.to_lowercase();
        self.vocab
            .iter()
            .map(|word| text.matches(word).count() as f32)
            .collect()
    }
}

impl Embedder for KeywordEmbedder {
    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on_call == Some(call) {
            return Err(Error::Embedding("quota exceeded".to_string()));
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        Ok(self.vector(text))
    }

    fn dimension(&self) -> usize {
        self.vocab.len()
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Generation backend that replays a fixed outcome and records its prompts.
pub struct ScriptedBackend {
    name: &'static str,
    reply: Option<String>,
    pub prompts: Vec<String>,
}

impl ScriptedBackend {
    pub fn replying(name: &'static str, reply: &str) -> Self {
        Self {
            name,
            reply: Some(reply.to_string()),
            prompts: Vec::new(),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            reply: None,
            prompts: Vec::new(),
        }
    }
}

impl GenerationBackend for ScriptedBackend {
    fn generate(&mut self, prompt: &str) -> std::result::Result<String, BackendError> {
        self.prompts.push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| BackendError::Unavailable(format!("{} is down", self.name)))
    }

    fn model_name(&self) -> &str {
        self.name
    }
}
