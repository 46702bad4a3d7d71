mod card;
mod dealing;
mod events;
mod request;
mod room;

use crate::catalog::Catalog;
use crate::error::GameError;
use crate::store::{MemoryStore, RoomRecord, Store, TokenOwner};
use crate::types::*;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use card::CardOutcome;
pub use events::{EVENT_LOG_CAPACITY, EVENT_SNAPSHOT_LEN};
pub use room::{JoinTicket, NewRoom, RoomSnapshot};

/// Shared application state
///
/// Every action runs load → mutate → save while holding the store lock, so
/// one action is one atomic unit of work and a poller never observes a
/// half-applied change. A failing action returns before `save_room`.
pub struct AppState {
    store: Mutex<Box<dyn Store>>,
    pub catalog: Arc<Catalog>,
    pub rules: GameRules,
}

impl AppState {
    pub fn new(store: Box<dyn Store>, catalog: Arc<Catalog>, rules: GameRules) -> Self {
        Self {
            store: Mutex::new(store),
            catalog,
            rules,
        }
    }

    /// In-memory state with the built-in catalog and default rules
    pub fn in_memory() -> Result<Self, crate::catalog::CatalogError> {
        Ok(Self::new(
            Box::new(MemoryStore::new()),
            Arc::new(Catalog::builtin()?),
            GameRules::default(),
        ))
    }

    /// Resolve a bearer token to a player and load that player's room
    fn resolve_player(store: &dyn Store, token: &str) -> Result<(RoomRecord, PlayerId), GameError> {
        let Some(TokenOwner::Player {
            room_code,
            player_id,
        }) = store.find_token(token)?
        else {
            tracing::warn!("Rejected unknown player token");
            return Err(GameError::InvalidToken);
        };

        let record = store
            .load_room(&room_code)?
            .ok_or(GameError::InvalidToken)?;

        // The index and the aggregate must agree before the token counts
        if !record
            .players
            .iter()
            .any(|p| p.id == player_id && p.token == token)
        {
            tracing::warn!(room = %room_code, player_id, "Token index out of date");
            return Err(GameError::InvalidToken);
        }

        Ok((record, player_id))
    }

    /// Run a read-only closure against the caller's room
    async fn read_as_player<T>(
        &self,
        token: &str,
        f: impl FnOnce(&RoomRecord, PlayerId) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let store = self.store.lock().await;
        let (record, player_id) = Self::resolve_player(&**store, token)?;
        f(&record, player_id)
    }

    /// Run a mutation against the caller's room and persist it on success
    async fn mutate_as_player<T>(
        &self,
        token: &str,
        f: impl FnOnce(&mut RoomRecord, PlayerId) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let mut store = self.store.lock().await;
        let (mut record, player_id) = Self::resolve_player(&**store, token)?;
        let out = f(&mut record, player_id)?;
        store.save_room(&record)?;
        Ok(out)
    }

    /// Like [`Self::mutate_as_player`] but only for the room's host
    async fn mutate_as_host<T>(
        &self,
        token: &str,
        action: &'static str,
        f: impl FnOnce(&mut RoomRecord, PlayerId) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        self.mutate_as_player(token, |record, player_id| {
            record.require_host(player_id, action)?;
            f(record, player_id)
        })
        .await
    }

    /// Run a mutation against a room looked up by code
    async fn mutate_room<T>(
        &self,
        code: &str,
        f: impl FnOnce(&mut RoomRecord) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let mut store = self.store.lock().await;
        let mut record = store.load_room(code)?.ok_or(GameError::RoomNotFound)?;
        let out = f(&mut record)?;
        store.save_room(&record)?;
        Ok(out)
    }

    /// Load a room by code without changing it
    async fn load_room(&self, code: &str) -> Result<RoomRecord, GameError> {
        self.store
            .lock()
            .await
            .load_room(code)?
            .ok_or(GameError::RoomNotFound)
    }
}

/// Trimmed user text, or `fallback` when blank
fn text_or(value: &str, fallback: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

impl RoomRecord {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Display name of a player, empty if unknown
    pub fn player_name(&self, id: PlayerId) -> String {
        self.player(id).map(|p| p.name.clone()).unwrap_or_default()
    }

    pub fn require_host(&self, player_id: PlayerId, action: &'static str) -> Result<(), GameError> {
        if player_id != self.room.host_player_id {
            tracing::warn!(room = %self.room.code, player_id, action, "Non-host attempted host action");
            return Err(GameError::NotHost(action));
        }
        Ok(())
    }

    /// Finished rooms accept reads only
    pub fn ensure_not_finished(&self) -> Result<(), GameError> {
        if self.room.status == RoomStatus::Finished {
            return Err(GameError::GameFinished);
        }
        Ok(())
    }

    pub fn ensure_playing(&self) -> Result<(), GameError> {
        match self.room.status {
            RoomStatus::Playing => Ok(()),
            RoomStatus::Lobby => Err(GameError::GameNotStarted),
            RoomStatus::Finished => Err(GameError::GameFinished),
        }
    }
}
