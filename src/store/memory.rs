use std::collections::HashMap;

use super::{RoomRecord, Store, StoreError, TokenOwner};
use crate::types::RoomCode;

/// Process-memory backend for offline play and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: HashMap<RoomCode, RoomRecord>,
    tokens: HashMap<String, TokenOwner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn contains_room(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.rooms.contains_key(code))
    }

    fn load_room(&self, code: &str) -> Result<Option<RoomRecord>, StoreError> {
        Ok(self.rooms.get(code).cloned())
    }

    fn save_room(&mut self, record: &RoomRecord) -> Result<(), StoreError> {
        let code = &record.room.code;

        // Rebuild this room's slice of the index so replaced tokens stop resolving
        self.tokens.retain(|_, owner| owner.room_code() != code);
        for (token, owner) in record.token_owners() {
            self.tokens.insert(token, owner);
        }

        self.rooms.insert(code.clone(), record.clone());
        Ok(())
    }

    fn find_token(&self, token: &str) -> Result<Option<TokenOwner>, StoreError> {
        Ok(self.tokens.get(token).cloned())
    }
}
