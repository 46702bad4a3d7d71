//! Room storage
//!
//! The game engine works on whole room aggregates: it loads a [`RoomRecord`],
//! mutates it in memory and saves it back. Backends only have to persist the
//! aggregate atomically and keep a token index for credential lookups.

mod memory;
mod sqlite;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::types::*;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// What a bearer token currently resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOwner {
    Player {
        room_code: RoomCode,
        player_id: PlayerId,
    },
    /// Issued by `joinRoom`, not yet turned into a player
    JoinRequest {
        room_code: RoomCode,
        request_id: RequestId,
    },
}

impl TokenOwner {
    pub fn room_code(&self) -> &str {
        match self {
            TokenOwner::Player { room_code, .. } | TokenOwner::JoinRequest { room_code, .. } => {
                room_code
            }
        }
    }
}

/// Room aggregate: the room row and everything it owns
#[derive(Debug, Clone)]
pub struct RoomRecord {
    pub room: Room,
    /// Ordered by id
    pub players: Vec<Player>,
    pub cards: BTreeMap<CardId, Card>,
    /// Ordered by id
    pub requests: Vec<Request>,
    /// Most recent entries only, oldest first
    pub events: VecDeque<Event>,
    /// Every phrase ever dealt in this room, whatever happened to the card
    pub used_phrase_ids: BTreeSet<PhraseId>,
    pub next_player_id: PlayerId,
    pub next_card_id: CardId,
    pub next_request_id: RequestId,
    pub next_event_id: EventId,
}

impl RoomRecord {
    /// Every token that should resolve into this room.
    ///
    /// A join request token that already belongs to a player is reported as
    /// the player only.
    pub fn token_owners(&self) -> Vec<(String, TokenOwner)> {
        let mut owners: Vec<(String, TokenOwner)> = self
            .players
            .iter()
            .map(|p| {
                (
                    p.token.clone(),
                    TokenOwner::Player {
                        room_code: self.room.code.clone(),
                        player_id: p.id,
                    },
                )
            })
            .collect();

        for request in &self.requests {
            let Some(token) = &request.join_token else {
                continue;
            };
            if self.players.iter().any(|p| &p.token == token) {
                continue;
            }
            owners.push((
                token.clone(),
                TokenOwner::JoinRequest {
                    room_code: self.room.code.clone(),
                    request_id: request.id,
                },
            ));
        }

        owners
    }
}

/// Storage backend for room aggregates
pub trait Store: Send {
    /// Whether a room with this code exists
    fn contains_room(&self, code: &str) -> Result<bool, StoreError>;

    /// Load a full room aggregate
    fn load_room(&self, code: &str) -> Result<Option<RoomRecord>, StoreError>;

    /// Persist a room aggregate atomically, replacing any previous version
    fn save_room(&mut self, record: &RoomRecord) -> Result<(), StoreError>;

    /// Resolve a bearer token
    fn find_token(&self, token: &str) -> Result<Option<TokenOwner>, StoreError>;
}
