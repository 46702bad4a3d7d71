//! Credentials: room codes and bearer tokens
//!
//! Tokens are the whole authentication story, so they come from the thread
//! CSPRNG. Room codes only need to be short and easy to read aloud.

use rand::Rng;

use crate::error::GameError;
use crate::store::Store;

/// Safe character set for room codes (excludes 0/O and 1/I to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;
const CODE_ATTEMPTS: usize = 10;

const TOKEN_BYTES: usize = 32;

/// Generate a random room code (6 characters)
fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Pick a room code not used by any stored room
pub fn unique_room_code(store: &dyn Store) -> Result<String, GameError> {
    for _ in 0..CODE_ATTEMPTS {
        let code = generate_room_code();
        if !store.contains_room(&code)? {
            return Ok(code);
        }
        tracing::debug!(code, "Room code collision, retrying");
    }
    Err(GameError::CodeSpaceExhausted)
}

/// 32 random bytes, hex encoded
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    hex::encode(bytes)
}

/// Canonical form of a room code typed by a person
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RoomRecord, StoreError, TokenOwner};

    /// Store that claims every code is taken
    struct FullStore;

    impl Store for FullStore {
        fn contains_room(&self, _code: &str) -> Result<bool, StoreError> {
            Ok(true)
        }
        fn load_room(&self, _code: &str) -> Result<Option<RoomRecord>, StoreError> {
            Ok(None)
        }
        fn save_room(&mut self, _record: &RoomRecord) -> Result<(), StoreError> {
            Ok(())
        }
        fn find_token(&self, _token: &str) -> Result<Option<TokenOwner>, StoreError> {
            Ok(None)
        }
    }

    #[test]
    fn test_room_code_shape() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
            assert!(!code.contains('O') && !code.contains('0'));
            assert!(!code.contains('I') && !code.contains('1'));
        }
    }

    #[test]
    fn test_code_generation_gives_up() {
        let result = unique_room_code(&FullStore);
        assert!(matches!(result, Err(GameError::CodeSpaceExhausted)));
    }

    #[test]
    fn test_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_normalize_room_code() {
        assert_eq!(normalize_room_code("  abc234 "), "ABC234");
    }
}
