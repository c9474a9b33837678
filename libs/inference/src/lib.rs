//! Inference Provider Contract
//!
//! The visualizer never runs a model itself. It talks to whatever can
//! `encode` text, run a `forward` pass that yields one score per
//! vocabulary id for the final position, and `decode` ids back to text.
//!
//! A small word-level bigram model is bundled so the pipeline can be
//! driven end to end without an external runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod bigram;
mod tokenizer;
mod vocab;

pub use bigram::{BigramConfig, BigramModel};
pub use tokenizer::{split_pieces, WordTokenizer};
pub use vocab::Vocabulary;

/// Special tokens reserved at the start of every vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialToken {
    /// Unknown piece
    Unk,
    /// End of sequence
    Eos,
}

impl SpecialToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialToken::Unk => "<UNK>",
            SpecialToken::Eos => "<EOS>",
        }
    }

    /// Fixed id of this token in every vocabulary
    pub fn id(&self) -> u32 {
        match self {
            SpecialToken::Unk => 0,
            SpecialToken::Eos => 1,
        }
    }

    pub fn all() -> [SpecialToken; 2] {
        [SpecialToken::Unk, SpecialToken::Eos]
    }
}

/// One encoded position: vocabulary id plus the text it covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedToken {
    pub id: u32,
    pub text: String,
}

impl EncodedToken {
    pub fn new(id: u32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// Descriptive model facts shown alongside the diagram
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Display name
    pub name: String,
    /// Number of transform stages drawn between embeddings and logits
    pub n_layers: usize,
    /// Hidden width
    pub d_model: usize,
    /// Attention heads per stage
    pub n_heads: usize,
    /// Vocabulary size (length of every `forward` result)
    pub vocab_size: usize,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            name: "unloaded".to_string(),
            n_layers: 0,
            d_model: 0,
            n_heads: 0,
            vocab_size: 0,
        }
    }
}

/// Error type for inference operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    /// Model or tokenizer has not been loaded/trained yet
    #[error("Model is not ready")]
    NotReady,
    /// Id outside the vocabulary
    #[error("Unknown token id: {0}")]
    UnknownToken(u32),
    /// `forward` was called with no tokens
    #[error("Empty input sequence")]
    EmptyInput,
    /// Training text produced no tokens
    #[error("Training corpus is empty")]
    EmptyCorpus,
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Maps vocabulary ids back to text
pub trait TokenDecoder {
    fn decode(&self, id: u32) -> Result<String, InferenceError>;
}

/// A model the pipeline can query for next-token scores
pub trait InferenceProvider: TokenDecoder {
    /// Facts about the loaded model
    fn metadata(&self) -> &ModelMetadata;

    /// Whether `encode`/`forward` can be called
    fn is_ready(&self) -> bool;

    /// Split text into vocabulary tokens
    fn encode(&self, text: &str) -> Result<Vec<EncodedToken>, InferenceError>;

    /// Raw scores for the position after the last token, one per vocabulary id
    fn forward(&mut self, encoded: &[EncodedToken]) -> Result<Vec<f32>, InferenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_tokens() {
        assert_eq!(SpecialToken::Unk.as_str(), "<UNK>");
        assert_eq!(SpecialToken::Eos.as_str(), "<EOS>");
        for (i, special) in SpecialToken::all().iter().enumerate() {
            assert_eq!(special.id() as usize, i);
        }
    }

    #[test]
    fn test_inference_error_display() {
        assert_eq!(InferenceError::NotReady.to_string(), "Model is not ready");
        assert_eq!(InferenceError::UnknownToken(42).to_string(), "Unknown token id: 42");
        assert_eq!(InferenceError::EmptyInput.to_string(), "Empty input sequence");
    }

    #[test]
    fn test_metadata_default_is_unloaded() {
        let meta = ModelMetadata::default();
        assert_eq!(meta.name, "unloaded");
        assert_eq!(meta.vocab_size, 0);
    }
}
