//! Phrase and deck reference data. Read-only after load.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::types::{DeckId, PhraseId};

/// Catalog compiled into the binary, used when no file is configured
const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Deck used when a room is created without an explicit deck id
pub const DEFAULT_DECK_ID: &str = "classic";

/// Rendered for phrase ids missing from the catalog
const UNKNOWN_PHRASE: &str = "...";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid catalog: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phrase {
    pub id: PhraseId,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: DeckId,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub image: Option<String>,
    pub phrase_ids: Vec<PhraseId>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    phrases: Vec<Phrase>,
    decks: Vec<Deck>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    phrases: HashMap<PhraseId, String>,
    decks: Vec<Deck>,
}

impl Catalog {
    /// The catalog shipped with the binary
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Load a catalog JSON file from disk
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(raw)?;
        Self::new(file.phrases, file.decks)
    }

    pub fn new(phrases: Vec<Phrase>, decks: Vec<Deck>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(phrases.len());
        for phrase in phrases {
            if by_id.insert(phrase.id, phrase.text).is_some() {
                return Err(CatalogError::Invalid(format!(
                    "duplicate phrase id {}",
                    phrase.id
                )));
            }
        }

        let mut seen = HashSet::new();
        for deck in &decks {
            if !seen.insert(deck.id.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate deck id {:?}",
                    deck.id
                )));
            }
            if let Some(missing) = deck.phrase_ids.iter().find(|id| !by_id.contains_key(*id)) {
                return Err(CatalogError::Invalid(format!(
                    "deck {:?} references unknown phrase {}",
                    deck.id, missing
                )));
            }
            let mut listed = HashSet::new();
            if let Some(repeated) = deck.phrase_ids.iter().find(|id| !listed.insert(**id)) {
                return Err(CatalogError::Invalid(format!(
                    "deck {:?} lists phrase {} twice",
                    deck.id, repeated
                )));
            }
        }

        Ok(Self {
            phrases: by_id,
            decks,
        })
    }

    pub fn decks(&self) -> &[Deck] {
        &self.decks
    }

    /// Find a deck by id. Empty input selects the default deck.
    pub fn deck(&self, id: &str) -> Option<&Deck> {
        let id = id.trim();
        let id = if id.is_empty() { DEFAULT_DECK_ID } else { id };
        self.decks.iter().find(|d| d.id == id)
    }

    pub fn phrase_text(&self, id: PhraseId) -> &str {
        self.phrases
            .get(&id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_PHRASE)
    }
}
