//! Word-level tokenizer
//!
//! Text is split into pieces that carry their leading whitespace
//! (`"The cat sat."` → `["The", " cat", " sat", "."]`), so decoding is
//! plain concatenation and always reproduces the input.

use crate::{EncodedToken, InferenceError, Vocabulary};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Split text into whitespace-prefixed word pieces and single punctuation marks
pub fn split_pieces(text: &str) -> Vec<String> {
    fn flush(current: &mut String, pieces: &mut Vec<String>) {
        if !current.is_empty() {
            pieces.push(std::mem::take(current));
        }
    }

    let mut pieces = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_whitespace() {
            flush(&mut current, &mut pieces);
            current.push(c);
        } else if c.is_alphanumeric() || c == '\'' {
            current.push(c);
        } else {
            flush(&mut current, &mut pieces);
            pieces.push(c.to_string());
        }
    }
    flush(&mut current, &mut pieces);

    pieces
}

/// Tokenizer over a learned piece vocabulary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordTokenizer {
    vocab: Vocabulary,
    min_frequency: u32,
    trained: bool,
}

impl WordTokenizer {
    /// Create an untrained tokenizer; pieces seen fewer than `min_frequency` times map to `<UNK>`
    pub fn new(min_frequency: u32) -> Self {
        Self {
            vocab: Vocabulary::new(),
            min_frequency: min_frequency.max(1),
            trained: false,
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Learn the vocabulary from training texts.
    ///
    /// Pieces are added in order of first appearance so ids are stable
    /// for a given corpus.
    pub fn train(&mut self, texts: &[&str]) -> Result<(), InferenceError> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for text in texts {
            for piece in split_pieces(text) {
                let count = counts.entry(piece.clone()).or_insert(0);
                if *count == 0 {
                    order.push(piece);
                }
                *count += 1;
            }
        }

        if order.is_empty() {
            return Err(InferenceError::EmptyCorpus);
        }

        let mut vocab = Vocabulary::new();
        for piece in &order {
            if counts[piece] >= self.min_frequency {
                vocab.intern(piece);
            }
        }

        self.vocab = vocab;
        self.trained = true;
        Ok(())
    }

    /// Encode text; unknown pieces become `<UNK>` but keep their original text
    pub fn encode(&self, text: &str) -> Result<Vec<EncodedToken>, InferenceError> {
        if !self.trained {
            return Err(InferenceError::NotReady);
        }
        let unk = Vocabulary::UNK_ID;
        Ok(split_pieces(text)
            .into_iter()
            .map(|piece| {
                let id = self.vocab.id(&piece).unwrap_or(unk);
                EncodedToken { id, text: piece }
            })
            .collect())
    }

    /// Text for a single id
    pub fn decode_one(&self, id: u32) -> Result<String, InferenceError> {
        self.vocab
            .piece(id)
            .map(str::to_string)
            .ok_or(InferenceError::UnknownToken(id))
    }

    /// Concatenated text for a sequence of ids
    pub fn decode(&self, ids: &[u32]) -> Result<String, InferenceError> {
        ids.iter().map(|&id| self.decode_one(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pieces_keeps_leading_space() {
        assert_eq!(split_pieces("The cat sat."), vec!["The", " cat", " sat", "."]);
        assert_eq!(split_pieces("a  b"), vec!["a", " ", " b"]);
        assert_eq!(split_pieces("don't stop"), vec!["don't", " stop"]);
        assert!(split_pieces("").is_empty());
    }

    #[test]
    fn test_split_pieces_concat_roundtrip() {
        let text = "Hello, world!\nNew line here.";
        assert_eq!(split_pieces(text).concat(), text);
    }

    #[test]
    fn test_untrained_encode_is_not_ready() {
        let tok = WordTokenizer::new(1);
        assert_eq!(tok.encode("hi").unwrap_err(), InferenceError::NotReady);
    }

    #[test]
    fn test_train_and_encode() {
        let mut tok = WordTokenizer::new(1);
        tok.train(&["the cat sat on the mat"]).unwrap();
        assert!(tok.is_trained());

        let encoded = tok.encode("the cat").unwrap();
        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded[0].text, "the");
        assert_eq!(tok.decode_one(encoded[1].id).unwrap(), " cat");
    }

    #[test]
    fn test_rare_and_unseen_pieces_are_unk() {
        let mut tok = WordTokenizer::new(2);
        // "a" and " b" twice, " c" once
        tok.train(&["a b", "a b c"]).unwrap();
        let encoded = tok.encode("a c z").unwrap();
        let unk = Vocabulary::UNK_ID;
        assert_ne!(encoded[0].id, unk);
        assert_eq!(encoded[1].id, unk);
        assert_eq!(encoded[1].text, " c");
        assert_eq!(encoded[2].id, unk);
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let mut tok = WordTokenizer::new(1);
        assert_eq!(tok.train(&[""]).unwrap_err(), InferenceError::EmptyCorpus);
    }

    #[test]
    fn test_decode_unknown_id() {
        let mut tok = WordTokenizer::new(1);
        tok.train(&["x"]).unwrap();
        assert_eq!(tok.decode(&[999]).unwrap_err(), InferenceError::UnknownToken(999));
    }
}
