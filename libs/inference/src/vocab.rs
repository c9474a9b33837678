//! Piece table for the word tokenizer
//!
//! Ids are positions in a list that always opens with the special tokens,
//! so `<UNK>` and `<EOS>` keep their ids in every vocabulary. Only the list
//! is serialized; the reverse index is rebuilt (and checked) on load.

use crate::{InferenceError, SpecialToken};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    pieces: Vec<String>,
    index: HashMap<String, u32>,
}

impl Vocabulary {
    pub const UNK_ID: u32 = 0;
    pub const EOS_ID: u32 = 1;

    pub fn new() -> Self {
        let mut vocab = Self {
            pieces: Vec::new(),
            index: HashMap::new(),
        };
        for special in SpecialToken::all() {
            vocab.intern(special.as_str());
        }
        vocab
    }

    /// Number of ids, special tokens included
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// Id of `piece`, adding it if unseen
    pub fn intern(&mut self, piece: &str) -> u32 {
        if let Some(&id) = self.index.get(piece) {
            return id;
        }
        let id = self.pieces.len() as u32;
        self.index.insert(piece.to_string(), id);
        self.pieces.push(piece.to_string());
        id
    }

    pub fn id(&self, piece: &str) -> Option<u32> {
        self.index.get(piece).copied()
    }

    pub fn piece(&self, id: u32) -> Option<&str> {
        self.pieces.get(id as usize).map(String::as_str)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<String>> for Vocabulary {
    type Error = InferenceError;

    fn try_from(pieces: Vec<String>) -> Result<Self, Self::Error> {
        for special in SpecialToken::all() {
            if pieces.get(special.id() as usize).map(String::as_str) != Some(special.as_str()) {
                return Err(InferenceError::Serialization(format!(
                    "vocabulary is missing {} at id {}",
                    special.as_str(),
                    special.id()
                )));
            }
        }

        let mut vocab = Self {
            pieces: Vec::with_capacity(pieces.len()),
            index: HashMap::with_capacity(pieces.len()),
        };
        for piece in pieces {
            if vocab.index.contains_key(&piece) {
                return Err(InferenceError::Serialization(format!("duplicate piece {:?}", piece)));
            }
            vocab.intern(&piece);
        }
        Ok(vocab)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.pieces
    }
}
