//! Smoothed word-level bigram model
//!
//! Scores for the next position are additive-smoothed log-probabilities
//! conditioned on the last input token. Tokens never seen as a predecessor
//! back off to the unigram distribution.

use crate::{
    EncodedToken, InferenceError, InferenceProvider, ModelMetadata, TokenDecoder, Vocabulary,
    WordTokenizer,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Reference model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigramConfig {
    /// Display name reported in metadata
    pub name: String,
    /// Stage count reported to the diagram
    pub n_layers: usize,
    /// Hidden width reported in metadata
    pub d_model: usize,
    /// Head count reported in metadata
    pub n_heads: usize,
    /// Additive smoothing constant
    pub smoothing: f32,
    /// Minimum occurrences for a piece to enter the vocabulary
    pub min_frequency: u32,
}

impl BigramConfig {
    /// Compact preset: three drawn stages, no rare-word pruning
    pub fn tiny() -> Self {
        Self {
            name: "bigram-tiny".to_string(),
            n_layers: 3,
            d_model: 64,
            n_heads: 2,
            smoothing: 0.1,
            min_frequency: 1,
        }
    }

    /// Larger preset for real corpora
    pub fn small() -> Self {
        Self {
            name: "bigram-small".to_string(),
            n_layers: 6,
            d_model: 128,
            n_heads: 4,
            smoothing: 0.5,
            min_frequency: 2,
        }
    }
}

impl Default for BigramConfig {
    fn default() -> Self {
        Self::tiny()
    }
}

/// Word-level bigram model implementing [`InferenceProvider`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigramModel {
    config: BigramConfig,
    tokenizer: WordTokenizer,
    /// Next-token counts indexed by predecessor id
    transitions: Vec<HashMap<u32, u32>>,
    row_totals: Vec<u32>,
    unigrams: Vec<u32>,
    unigram_total: u32,
    metadata: ModelMetadata,
}

impl BigramModel {
    /// Untrained model; `encode`/`forward` report `NotReady` until [`train`](Self::train)
    pub fn new(config: BigramConfig) -> Self {
        let metadata = ModelMetadata {
            name: config.name.clone(),
            n_layers: config.n_layers,
            d_model: config.d_model,
            n_heads: config.n_heads,
            vocab_size: 0,
        };
        Self {
            tokenizer: WordTokenizer::new(config.min_frequency),
            config,
            transitions: Vec::new(),
            row_totals: Vec::new(),
            unigrams: Vec::new(),
            unigram_total: 0,
            metadata,
        }
    }

    /// Build and train in one step
    pub fn from_corpus(config: BigramConfig, texts: &[&str]) -> Result<Self, InferenceError> {
        let mut model = Self::new(config);
        model.train(texts)?;
        Ok(model)
    }

    pub fn config(&self) -> &BigramConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &WordTokenizer {
        &self.tokenizer
    }

    /// Learn vocabulary and bigram counts. Each text ends with an implicit `<EOS>`.
    pub fn train(&mut self, texts: &[&str]) -> Result<(), InferenceError> {
        self.tokenizer.train(texts)?;

        let vocab_size = self.tokenizer.vocab_size();
        let eos = Vocabulary::EOS_ID;
        let mut transitions = vec![HashMap::new(); vocab_size];
        let mut row_totals = vec![0u32; vocab_size];
        let mut unigrams = vec![0u32; vocab_size];
        let mut unigram_total = 0u32;

        for text in texts {
            let mut ids: Vec<u32> = self.tokenizer.encode(text)?.into_iter().map(|t| t.id).collect();
            if ids.is_empty() {
                continue;
            }
            ids.push(eos);

            for &id in &ids {
                unigrams[id as usize] += 1;
                unigram_total += 1;
            }
            for pair in ids.windows(2) {
                *transitions[pair[0] as usize].entry(pair[1]).or_insert(0) += 1;
                row_totals[pair[0] as usize] += 1;
            }
        }

        self.transitions = transitions;
        self.row_totals = row_totals;
        self.unigrams = unigrams;
        self.unigram_total = unigram_total;
        self.metadata.vocab_size = vocab_size;

        info!(
            model = %self.config.name,
            vocab = vocab_size,
            tokens = unigram_total,
            "trained bigram model"
        );
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, InferenceError> {
        serde_json::to_string(self).map_err(|e| InferenceError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, InferenceError> {
        serde_json::from_str(json).map_err(|e| InferenceError::Serialization(e.to_string()))
    }

    fn smoothed_log_probs(&self, counts: impl Fn(u32) -> u32, total: u32) -> Vec<f32> {
        let alpha = self.config.smoothing.max(f32::EPSILON);
        let vocab = self.metadata.vocab_size;
        let denom = (total as f32 + alpha * vocab as f32).ln();
        (0..vocab as u32)
            .map(|id| (counts(id) as f32 + alpha).ln() - denom)
            .collect()
    }
}

impl TokenDecoder for BigramModel {
    fn decode(&self, id: u32) -> Result<String, InferenceError> {
        self.tokenizer.decode_one(id)
    }
}

impl InferenceProvider for BigramModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn is_ready(&self) -> bool {
        self.tokenizer.is_trained()
    }

    fn encode(&self, text: &str) -> Result<Vec<EncodedToken>, InferenceError> {
        self.tokenizer.encode(text)
    }

    fn forward(&mut self, encoded: &[EncodedToken]) -> Result<Vec<f32>, InferenceError> {
        if !self.is_ready() {
            return Err(InferenceError::NotReady);
        }
        let last = encoded.last().ok_or(InferenceError::EmptyInput)?;
        let row = last.id as usize;
        if row >= self.transitions.len() {
            return Err(InferenceError::UnknownToken(last.id));
        }

        let scores = if self.row_totals[row] > 0 {
            let counts = &self.transitions[row];
            self.smoothed_log_probs(|id| counts.get(&id).copied().unwrap_or(0), self.row_totals[row])
        } else {
            debug!(token = last.id, "no bigram row, backing off to unigrams");
            let unigrams = &self.unigrams;
            self.smoothed_log_probs(|id| unigrams[id as usize], self.unigram_total)
        };
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &[&str] = &["the cat sat on the mat", "the cat ran", "the dog sat"];

    fn argmax(scores: &[f32]) -> u32 {
        scores
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, &s)| if s > best.1 { (i, s) } else { best })
            .0 as u32
    }

    #[test]
    fn test_untrained_model_not_ready() {
        let mut model = BigramModel::new(BigramConfig::tiny());
        assert!(!model.is_ready());
        assert_eq!(model.encode("the").unwrap_err(), InferenceError::NotReady);
        let tokens = [EncodedToken::new(2, "the")];
        assert_eq!(model.forward(&tokens).unwrap_err(), InferenceError::NotReady);
    }

    #[test]
    fn test_forward_length_matches_vocab() {
        let mut model = BigramModel::from_corpus(BigramConfig::tiny(), CORPUS).unwrap();
        let encoded = model.encode("the").unwrap();
        let scores = model.forward(&encoded).unwrap();
        assert_eq!(scores.len(), model.metadata().vocab_size);
        assert!(scores.iter().all(|s| s.is_finite() && *s < 0.0));
    }

    #[test]
    fn test_most_frequent_successor_wins() {
        let mut model = BigramModel::from_corpus(BigramConfig::tiny(), CORPUS).unwrap();
        let encoded = model.encode("the").unwrap();
        let scores = model.forward(&encoded).unwrap();
        assert_eq!(model.decode(argmax(&scores)).unwrap(), " cat");
    }

    #[test]
    fn test_scores_are_log_probabilities() {
        let mut model = BigramModel::from_corpus(BigramConfig::tiny(), CORPUS).unwrap();
        let encoded = model.encode("the cat").unwrap();
        let scores = model.forward(&encoded).unwrap();
        let total: f32 = scores.iter().map(|s| s.exp()).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_text_end_predicts_eos() {
        let mut model = BigramModel::from_corpus(BigramConfig::tiny(), &["a b", "c b"]).unwrap();
        let encoded = model.encode("a b").unwrap();
        let scores = model.forward(&encoded).unwrap();
        assert_eq!(argmax(&scores), Vocabulary::EOS_ID);
    }

    #[test]
    fn test_unknown_piece_backs_off_to_unigrams() {
        let mut model = BigramModel::from_corpus(BigramConfig::tiny(), CORPUS).unwrap();
        let encoded = model.encode("zebra").unwrap();
        assert_eq!(encoded[0].id, Vocabulary::UNK_ID);
        let scores = model.forward(&encoded).unwrap();
        let vocab = model.tokenizer().vocab();
        let the = vocab.id("the").unwrap() as usize;
        let ran = vocab.id(" ran").unwrap() as usize;
        // "the" opens every text, " ran" occurs once
        assert!(scores[the] > scores[ran]);
        assert_eq!(scores[the], scores[Vocabulary::EOS_ID as usize]);
    }

    #[test]
    fn test_empty_input_rejected() {
        let mut model = BigramModel::from_corpus(BigramConfig::tiny(), CORPUS).unwrap();
        assert_eq!(model.forward(&[]).unwrap_err(), InferenceError::EmptyInput);
    }

    #[test]
    fn test_out_of_range_ids() {
        let mut model = BigramModel::from_corpus(BigramConfig::tiny(), CORPUS).unwrap();
        assert_eq!(model.decode(10_000).unwrap_err(), InferenceError::UnknownToken(10_000));
        let tokens = [EncodedToken::new(10_000, "?")];
        assert_eq!(model.forward(&tokens).unwrap_err(), InferenceError::UnknownToken(10_000));
    }

    #[test]
    fn test_metadata_reflects_config() {
        let model = BigramModel::from_corpus(BigramConfig::small(), &["a b", "a b", "c"]).unwrap();
        let meta = model.metadata();
        assert_eq!(meta.name, "bigram-small");
        assert_eq!(meta.n_layers, 6);
        assert_eq!(meta.vocab_size, 4);
    }

    #[test]
    fn test_json_roundtrip_keeps_predictions() {
        let mut model = BigramModel::from_corpus(BigramConfig::tiny(), CORPUS).unwrap();
        let mut loaded = BigramModel::from_json(&model.to_json().unwrap()).unwrap();
        let encoded = model.encode("the dog").unwrap();
        assert_eq!(model.forward(&encoded).unwrap(), loaded.forward(&encoded).unwrap());
    }
}
