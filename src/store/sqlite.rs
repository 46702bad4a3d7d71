//! SQLite backend
//!
//! Rooms are stored in normalised tables. `save_room` rewrites the room's
//! rows inside one transaction, so a reader never sees half an aggregate.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{RoomRecord, Store, StoreError, TokenOwner};
use crate::types::*;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial schema",
    sql: r#"
        CREATE TABLE IF NOT EXISTS rooms (
            code TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            active_deck_id TEXT NOT NULL,
            host_player_id INTEGER NOT NULL,
            permissions_mode TEXT NOT NULL,
            created_at TEXT NOT NULL,
            next_player_id INTEGER NOT NULL,
            next_card_id INTEGER NOT NULL,
            next_request_id INTEGER NOT NULL,
            next_event_id INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS players (
            room_code TEXT NOT NULL REFERENCES rooms(code) ON DELETE CASCADE,
            id INTEGER NOT NULL,
            name TEXT NOT NULL,
            token TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            PRIMARY KEY (room_code, id)
        );

        CREATE TABLE IF NOT EXISTS cards (
            room_code TEXT NOT NULL REFERENCES rooms(code) ON DELETE CASCADE,
            id INTEGER NOT NULL,
            owner_player_id INTEGER NOT NULL,
            phrase_id INTEGER NOT NULL,
            state TEXT NOT NULL,
            assigned_at TEXT NOT NULL,
            resolved_at TEXT,
            PRIMARY KEY (room_code, id),
            UNIQUE (room_code, phrase_id)
        );

        CREATE TABLE IF NOT EXISTS requests (
            room_code TEXT NOT NULL REFERENCES rooms(code) ON DELETE CASCADE,
            id INTEGER NOT NULL,
            status TEXT NOT NULL,
            body TEXT NOT NULL,
            join_token TEXT,
            created_at TEXT NOT NULL,
            PRIMARY KEY (room_code, id)
        );
        CREATE INDEX IF NOT EXISTS idx_requests_join_token ON requests(join_token);

        CREATE TABLE IF NOT EXISTS events (
            room_code TEXT NOT NULL REFERENCES rooms(code) ON DELETE CASCADE,
            id INTEGER NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (room_code, id)
        );

        CREATE TABLE IF NOT EXISTS used_phrases (
            room_code TEXT NOT NULL REFERENCES rooms(code) ON DELETE CASCADE,
            phrase_id INTEGER NOT NULL,
            PRIMARY KEY (room_code, phrase_id)
        );
    "#,
}];

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version > current {
            tracing::info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );
            conn.execute_batch(migration.sql)?;
            conn.execute(
                "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                params![
                    migration.version,
                    migration.description,
                    Utc::now().to_rfc3339()
                ],
            )?;
        }
    }

    Ok(())
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {s:?}: {e}")))
}

fn parse_datetime_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

/// Persistent backend over a single SQLite connection
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    fn load_players(&self, code: &str) -> Result<Vec<Player>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, token, created_at FROM players WHERE room_code = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![code], |row| {
                Ok((
                    row.get::<_, u64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name, token, created_at)| {
                Ok(Player {
                    id,
                    name,
                    token,
                    created_at: parse_datetime(&created_at)?,
                })
            })
            .collect()
    }

    fn load_cards(&self, code: &str) -> Result<BTreeMap<CardId, Card>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_player_id, phrase_id, state, assigned_at, resolved_at
             FROM cards WHERE room_code = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![code], |row| {
                Ok((
                    row.get::<_, u64>(0)?,
                    row.get::<_, u64>(1)?,
                    row.get::<_, u64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut cards = BTreeMap::new();
        for (id, owner_player_id, phrase_id, state, assigned_at, resolved_at) in rows {
            let state = CardState::parse(&state)
                .ok_or_else(|| StoreError::Corrupt(format!("bad card state {state:?}")))?;
            cards.insert(
                id,
                Card {
                    id,
                    owner_player_id,
                    phrase_id,
                    state,
                    assigned_at: parse_datetime(&assigned_at)?,
                    resolved_at: parse_datetime_opt(resolved_at)?,
                },
            );
        }
        Ok(cards)
    }

    fn load_requests(&self, code: &str) -> Result<Vec<Request>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, status, body, join_token, created_at
             FROM requests WHERE room_code = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![code], |row| {
                Ok((
                    row.get::<_, u64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, status, body, join_token, created_at)| {
                let status = RequestStatus::parse(&status)
                    .ok_or_else(|| StoreError::Corrupt(format!("bad request status {status:?}")))?;
                Ok(Request {
                    id,
                    status,
                    kind: serde_json::from_str(&body)?,
                    created_at: parse_datetime(&created_at)?,
                    join_token,
                })
            })
            .collect()
    }

    fn load_events(&self, code: &str) -> Result<VecDeque<Event>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, body, created_at FROM events WHERE room_code = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![code], |row| {
                Ok((
                    row.get::<_, u64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, body, created_at)| {
                Ok(Event {
                    id,
                    kind: serde_json::from_str(&body)?,
                    created_at: parse_datetime(&created_at)?,
                })
            })
            .collect()
    }

    fn load_used_phrases(&self, code: &str) -> Result<BTreeSet<PhraseId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT phrase_id FROM used_phrases WHERE room_code = ?1")?;
        let used = stmt
            .query_map(params![code], |row| row.get::<_, u64>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(used)
    }
}

impl Store for SqliteStore {
    fn contains_room(&self, code: &str) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM rooms WHERE code = ?1", params![code], |_| {
                Ok(())
            })
            .optional()?;
        Ok(found.is_some())
    }

    fn load_room(&self, code: &str) -> Result<Option<RoomRecord>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT code, status, active_deck_id, host_player_id, permissions_mode, created_at,
                        next_player_id, next_card_id, next_request_id, next_event_id
                 FROM rooms WHERE code = ?1",
                params![code],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        [
                            row.get::<_, u64>(6)?,
                            row.get::<_, u64>(7)?,
                            row.get::<_, u64>(8)?,
                            row.get::<_, u64>(9)?,
                        ],
                    ))
                },
            )
            .optional()?;

        let Some((code, status, active_deck_id, host_player_id, permissions_mode, created_at, next)) =
            row
        else {
            return Ok(None);
        };

        let status = RoomStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("bad room status {status:?}")))?;

        Ok(Some(RoomRecord {
            players: self.load_players(&code)?,
            cards: self.load_cards(&code)?,
            requests: self.load_requests(&code)?,
            events: self.load_events(&code)?,
            used_phrase_ids: self.load_used_phrases(&code)?,
            room: Room {
                code,
                status,
                active_deck_id,
                host_player_id,
                permissions_mode,
                created_at: parse_datetime(&created_at)?,
            },
            next_player_id: next[0],
            next_card_id: next[1],
            next_request_id: next[2],
            next_event_id: next[3],
        }))
    }

    fn save_room(&mut self, record: &RoomRecord) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let room = &record.room;
        let code = room.code.as_str();

        tx.execute(
            "INSERT INTO rooms (code, status, active_deck_id, host_player_id, permissions_mode, created_at,
                                next_player_id, next_card_id, next_request_id, next_event_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(code) DO UPDATE SET
                status = excluded.status,
                active_deck_id = excluded.active_deck_id,
                host_player_id = excluded.host_player_id,
                permissions_mode = excluded.permissions_mode,
                next_player_id = excluded.next_player_id,
                next_card_id = excluded.next_card_id,
                next_request_id = excluded.next_request_id,
                next_event_id = excluded.next_event_id",
            params![
                code,
                room.status.as_str(),
                room.active_deck_id,
                room.host_player_id,
                room.permissions_mode,
                room.created_at.to_rfc3339(),
                record.next_player_id,
                record.next_card_id,
                record.next_request_id,
                record.next_event_id,
            ],
        )?;

        for table in ["players", "cards", "requests", "events", "used_phrases"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE room_code = ?1"),
                params![code],
            )?;
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO players (room_code, id, name, token, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for p in &record.players {
                stmt.execute(params![code, p.id, p.name, p.token, p.created_at.to_rfc3339()])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO cards (room_code, id, owner_player_id, phrase_id, state, assigned_at, resolved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for c in record.cards.values() {
                stmt.execute(params![
                    code,
                    c.id,
                    c.owner_player_id,
                    c.phrase_id,
                    c.state.as_str(),
                    c.assigned_at.to_rfc3339(),
                    c.resolved_at.map(|t| t.to_rfc3339()),
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO requests (room_code, id, status, body, join_token, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for r in &record.requests {
                stmt.execute(params![
                    code,
                    r.id,
                    r.status.as_str(),
                    serde_json::to_string(&r.kind)?,
                    r.join_token,
                    r.created_at.to_rfc3339(),
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO events (room_code, id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for e in &record.events {
                stmt.execute(params![
                    code,
                    e.id,
                    serde_json::to_string(&e.kind)?,
                    e.created_at.to_rfc3339(),
                ])?;
            }

            let mut stmt =
                tx.prepare("INSERT INTO used_phrases (room_code, phrase_id) VALUES (?1, ?2)")?;
            for phrase_id in &record.used_phrase_ids {
                stmt.execute(params![code, phrase_id])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn find_token(&self, token: &str) -> Result<Option<TokenOwner>, StoreError> {
        let player = self
            .conn
            .query_row(
                "SELECT room_code, id FROM players WHERE token = ?1",
                params![token],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)),
            )
            .optional()?;
        if let Some((room_code, player_id)) = player {
            return Ok(Some(TokenOwner::Player {
                room_code,
                player_id,
            }));
        }

        let request = self
            .conn
            .query_row(
                "SELECT room_code, id FROM requests WHERE join_token = ?1 ORDER BY id DESC LIMIT 1",
                params![token],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)),
            )
            .optional()?;
        Ok(request.map(|(room_code, request_id)| TokenOwner::JoinRequest {
            room_code,
            request_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(code: &str) -> RoomRecord {
        let now = Utc::now();
        let mut cards = BTreeMap::new();
        cards.insert(
            1,
            Card {
                id: 1,
                owner_player_id: 1,
                phrase_id: 42,
                state: CardState::Voided,
                assigned_at: now,
                resolved_at: Some(now),
            },
        );
        RoomRecord {
            room: Room {
                code: code.to_string(),
                status: RoomStatus::Playing,
                active_deck_id: "classic".to_string(),
                host_player_id: 1,
                permissions_mode: "host".to_string(),
                created_at: now,
            },
            players: vec![Player {
                id: 1,
                name: "Host".to_string(),
                token: "host-token".to_string(),
                created_at: now,
            }],
            cards,
            requests: vec![Request {
                id: 1,
                status: RequestStatus::Pending,
                kind: RequestKind::Join {
                    name: "Ana".to_string(),
                    decision: None,
                },
                created_at: now,
                join_token: Some("ana-token".to_string()),
            }],
            events: VecDeque::from(vec![Event {
                id: 1,
                kind: EventKind::GameStarted {},
                created_at: now,
            }]),
            used_phrase_ids: BTreeSet::from([42]),
            next_player_id: 2,
            next_card_id: 2,
            next_request_id: 2,
            next_event_id: 2,
        }
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        run_migrations(&store.conn).unwrap();
        let version: u32 = store
            .conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_save_and_load_room() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.save_room(&sample_record("ABC234")).unwrap();

        assert!(store.contains_room("ABC234").unwrap());
        assert!(!store.contains_room("ZZZZZZ").unwrap());

        let loaded = store.load_room("ABC234").unwrap().unwrap();
        assert_eq!(loaded.room.status, RoomStatus::Playing);
        assert_eq!(loaded.players.len(), 1);
        assert_eq!(loaded.cards[&1].state, CardState::Voided);
        assert!(loaded.cards[&1].resolved_at.is_some());
        assert_eq!(loaded.requests[0].join_token.as_deref(), Some("ana-token"));
        assert_eq!(loaded.events[0].kind, EventKind::GameStarted {});
        assert!(loaded.used_phrase_ids.contains(&42));
        assert_eq!(loaded.next_event_id, 2);
    }

    #[test]
    fn test_find_token_prefers_players() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut record = sample_record("ABC234");
        store.save_room(&record).unwrap();

        assert_eq!(
            store.find_token("ana-token").unwrap(),
            Some(TokenOwner::JoinRequest {
                room_code: "ABC234".to_string(),
                request_id: 1,
            })
        );

        record.players.push(Player {
            id: 2,
            name: "Ana".to_string(),
            token: "ana-token".to_string(),
            created_at: Utc::now(),
        });
        store.save_room(&record).unwrap();

        assert_eq!(
            store.find_token("ana-token").unwrap(),
            Some(TokenOwner::Player {
                room_code: "ABC234".to_string(),
                player_id: 2,
            })
        );
        assert_eq!(store.find_token("nope").unwrap(), None);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chamuyo.db");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.save_room(&sample_record("QWE789")).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load_room("QWE789").unwrap().unwrap();
        assert_eq!(loaded.players[0].token, "host-token");
    }
}
