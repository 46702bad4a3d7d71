use super::{text_or, AppState};
use crate::auth;
use crate::error::GameError;
use crate::protocol::{DeckInfo, JoinStatus, PlayerInfo, RoomInfo};
use crate::store::{RoomRecord, Store, TokenOwner};
use crate::types::*;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Credentials handed to the creator of a room
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub room_code: RoomCode,
    pub player_token: String,
    pub player_id: PlayerId,
}

/// Pending credential handed to someone asking to join
#[derive(Debug, Clone)]
pub struct JoinTicket {
    pub room_code: RoomCode,
    pub player_token: String,
}

/// What a poller sees of a room
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room: RoomInfo,
    pub players: Vec<PlayerInfo>,
    pub events: Vec<Event>,
}

impl RoomRecord {
    /// Fresh lobby whose only player is the host (player id 1)
    pub fn new(code: RoomCode, deck_id: DeckId, host_name: &str, host_token: String) -> Self {
        let now = chrono::Utc::now();
        let host = Player {
            id: 1,
            name: host_name.to_string(),
            token: host_token,
            created_at: now,
        };

        Self {
            room: Room {
                code,
                status: RoomStatus::Lobby,
                active_deck_id: deck_id,
                host_player_id: host.id,
                permissions_mode: "host".to_string(),
                created_at: now,
            },
            players: vec![host],
            cards: BTreeMap::new(),
            requests: Vec::new(),
            events: VecDeque::new(),
            used_phrase_ids: BTreeSet::new(),
            next_player_id: 2,
            next_card_id: 1,
            next_request_id: 1,
            next_event_id: 1,
        }
    }

    pub fn snapshot(&self, after: Option<EventId>) -> RoomSnapshot {
        RoomSnapshot {
            room: RoomInfo {
                code: self.room.code.clone(),
                status: self.room.status,
                active_deck_id: self.room.active_deck_id.clone(),
                permissions_mode: self.room.permissions_mode.clone(),
            },
            players: self
                .players
                .iter()
                .map(|p| PlayerInfo {
                    id: p.id,
                    name: p.name.clone(),
                    is_host: p.id == self.room.host_player_id,
                })
                .collect(),
            events: self.events_since(after),
        }
    }
}

impl AppState {
    /// Create a room in the lobby with the caller as host
    pub async fn create_room(
        &self,
        name: &str,
        deck_id: Option<&str>,
    ) -> Result<NewRoom, GameError> {
        let deck = self
            .catalog
            .deck(deck_id.unwrap_or_default())
            .ok_or(GameError::DeckNotFound)?;
        let name = text_or(name, "Host");

        let mut store = self.store.lock().await;
        let code = auth::unique_room_code(&**store)?;
        let token = auth::generate_token();

        let mut record = RoomRecord::new(code.clone(), deck.id.clone(), &name, token.clone());
        record.push_event(EventKind::RoomCreated {
            host: name,
            deck_id: deck.id.clone(),
        });
        store.save_room(&record)?;

        tracing::info!(room = %code, deck = %deck.id, "Room created");
        Ok(NewRoom {
            room_code: code,
            player_token: token,
            player_id: record.room.host_player_id,
        })
    }

    /// Ask to join a room. The returned token stays pending until the host
    /// answers the join request.
    pub async fn join_room(&self, code: &str, name: &str) -> Result<JoinTicket, GameError> {
        let code = auth::normalize_room_code(code);
        let name = text_or(name, "Guest");

        self.mutate_room(&code, |record| {
            record.ensure_not_finished()?;

            let token = auth::generate_token();
            record.push_request(
                RequestKind::Join {
                    name: name.clone(),
                    decision: None,
                },
                Some(token.clone()),
            );
            record.push_event(EventKind::JoinRequested { name });

            Ok(JoinTicket {
                room_code: record.room.code.clone(),
                player_token: token,
            })
        })
        .await
    }

    pub async fn get_room_state(
        &self,
        code: &str,
        after_event_id: Option<EventId>,
    ) -> Result<RoomSnapshot, GameError> {
        let record = self.load_room(&auth::normalize_room_code(code)).await?;
        Ok(record.snapshot(after_event_id))
    }

    /// Where a token stands: a player, a pending or rejected join, or nothing
    pub async fn get_join_status(
        &self,
        token: &str,
    ) -> Result<(JoinStatus, Option<RoomCode>), GameError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GameError::InvalidInput("token is required".to_string()));
        }

        let store = self.store.lock().await;
        match store.find_token(token)? {
            None => Ok((JoinStatus::Unknown, None)),
            Some(TokenOwner::Player { room_code, .. }) => Ok((JoinStatus::Active, Some(room_code))),
            Some(TokenOwner::JoinRequest {
                room_code,
                request_id,
            }) => {
                let status = join_request_status(&**store, &room_code, request_id)?;
                Ok((status, Some(room_code)))
            }
        }
    }

    /// Move the room from the lobby to playing and deal every hand
    pub async fn start_game(&self, token: &str) -> Result<(), GameError> {
        let catalog = &self.catalog;
        let hand_size = self.rules.hand_size;

        self.mutate_as_host(token, "start the game", |record, _| {
            match record.room.status {
                RoomStatus::Lobby => {}
                RoomStatus::Playing => return Err(GameError::GameAlreadyStarted),
                RoomStatus::Finished => return Err(GameError::GameFinished),
            }

            let player_ids: Vec<PlayerId> = record.players.iter().map(|p| p.id).collect();
            for player_id in player_ids {
                record.deal_up_to(catalog, player_id, hand_size);
            }
            record.room.status = RoomStatus::Playing;
            record.push_event(EventKind::GameStarted {});

            tracing::info!(
                room = %record.room.code,
                players = record.players.len(),
                "Game started"
            );
            Ok(())
        })
        .await
    }

    pub fn list_decks(&self) -> Vec<DeckInfo> {
        self.catalog
            .decks()
            .iter()
            .map(|d| DeckInfo {
                id: d.id.clone(),
                title: d.title.clone(),
                subtitle: d.subtitle.clone(),
                image: d.image.clone(),
            })
            .collect()
    }
}

fn join_request_status(
    store: &dyn Store,
    room_code: &str,
    request_id: RequestId,
) -> Result<JoinStatus, GameError> {
    let Some(record) = store.load_room(room_code)? else {
        return Ok(JoinStatus::Unknown);
    };
    let Some(request) = record.requests.iter().find(|r| r.id == request_id) else {
        return Ok(JoinStatus::Unknown);
    };

    Ok(match (&request.kind, request.status) {
        (_, RequestStatus::Pending) => JoinStatus::Pending,
        (
            RequestKind::Join {
                decision: Some(JoinDecision::Rejected),
                ..
            },
            _,
        ) => JoinStatus::Rejected,
        // Accepted tokens resolve to a player; this one was since replaced
        _ => JoinStatus::Unknown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::state_with_deck;

    #[tokio::test]
    async fn test_create_room_defaults() {
        let state = state_with_deck(10);
        let created = state.create_room("  ", None).await.unwrap();

        assert_eq!(created.room_code.len(), 6);
        assert_eq!(created.player_token.len(), 64);
        assert_eq!(created.player_id, 1);

        let snapshot = state.get_room_state(&created.room_code, None).await.unwrap();
        assert_eq!(snapshot.room.status, RoomStatus::Lobby);
        assert_eq!(snapshot.room.active_deck_id, "classic");
        assert_eq!(snapshot.room.permissions_mode, "host");
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.players[0].name, "Host");
        assert!(snapshot.players[0].is_host);
        assert_eq!(snapshot.events[0].kind.type_name(), "room_created");
    }

    #[tokio::test]
    async fn test_create_room_with_unknown_deck_fails() {
        let state = state_with_deck(10);
        let result = state.create_room("Host", Some("nope")).await;
        assert!(matches!(result, Err(GameError::DeckNotFound)));
    }

    #[tokio::test]
    async fn test_room_code_lookup_is_case_insensitive() {
        let state = state_with_deck(10);
        let created = state.create_room("Host", None).await.unwrap();

        let lower = format!(" {} ", created.room_code.to_lowercase());
        let ticket = state.join_room(&lower, "").await.unwrap();
        assert_eq!(ticket.room_code, created.room_code);

        let snapshot = state.get_room_state(&lower, None).await.unwrap();
        let last = snapshot.events.last().unwrap();
        assert_eq!(
            last.kind,
            EventKind::JoinRequested {
                name: "Guest".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_room() {
        let state = state_with_deck(10);
        assert!(matches!(
            state.join_room("ZZZZZZ", "Ana").await,
            Err(GameError::RoomNotFound)
        ));
        assert!(matches!(
            state.get_room_state("ZZZZZZ", None).await,
            Err(GameError::RoomNotFound)
        ));
    }

    #[tokio::test]
    async fn test_join_status_transitions() {
        let state = state_with_deck(20);
        let host = state.create_room("Host", None).await.unwrap();
        let ana = state.join_room(&host.room_code, "Ana").await.unwrap();
        let bob = state.join_room(&host.room_code, "Bob").await.unwrap();

        let (status, code) = state.get_join_status(&ana.player_token).await.unwrap();
        assert_eq!(status, JoinStatus::Pending);
        assert_eq!(code.as_deref(), Some(host.room_code.as_str()));

        let requests = state.list_requests(&host.player_token).await.unwrap();
        state
            .respond_join_request(&host.player_token, requests[0].id, "new", None)
            .await
            .unwrap();
        state
            .respond_join_request(&host.player_token, requests[1].id, "reject", None)
            .await
            .unwrap();

        let (status, _) = state.get_join_status(&ana.player_token).await.unwrap();
        assert_eq!(status, JoinStatus::Active);
        let (status, code) = state.get_join_status(&bob.player_token).await.unwrap();
        assert_eq!(status, JoinStatus::Rejected);
        assert!(code.is_some());

        let (status, code) = state.get_join_status("deadbeef").await.unwrap();
        assert_eq!(status, JoinStatus::Unknown);
        assert!(code.is_none());

        assert!(matches!(
            state.get_join_status("").await,
            Err(GameError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_non_host_cannot_start() {
        let state = state_with_deck(20);
        let host = state.create_room("Host", None).await.unwrap();
        let ana = state.join_room(&host.room_code, "Ana").await.unwrap();
        let request_id = state.list_requests(&host.player_token).await.unwrap()[0].id;
        state
            .respond_join_request(&host.player_token, request_id, "new", None)
            .await
            .unwrap();

        let result = state.start_game(&ana.player_token).await;
        assert!(matches!(result, Err(GameError::NotHost(_))));

        let snapshot = state.get_room_state(&host.room_code, None).await.unwrap();
        assert_eq!(snapshot.room.status, RoomStatus::Lobby);
    }

    #[tokio::test]
    async fn test_start_game_deals_shortfall_once() {
        let state = state_with_deck(20);
        let host = state.create_room("Host", None).await.unwrap();
        state.start_game(&host.player_token).await.unwrap();

        assert_eq!(state.get_my_hand(&host.player_token).await.unwrap().len(), 5);

        let snapshot = state.get_room_state(&host.room_code, None).await.unwrap();
        assert_eq!(snapshot.room.status, RoomStatus::Playing);
        assert_eq!(snapshot.events.last().unwrap().kind, EventKind::GameStarted {});

        assert!(matches!(
            state.start_game(&host.player_token).await,
            Err(GameError::GameAlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_start_game_with_short_deck() {
        let state = state_with_deck(3);
        let host = state.create_room("Host", None).await.unwrap();
        state.start_game(&host.player_token).await.unwrap();

        assert_eq!(state.get_my_hand(&host.player_token).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_after_event_id_returns_only_newer_events() {
        let state = state_with_deck(20);
        let host = state.create_room("Host", None).await.unwrap();
        let first = state.get_room_state(&host.room_code, None).await.unwrap();
        let mark = first.events.last().unwrap().id;

        state.join_room(&host.room_code, "Ana").await.unwrap();
        let newer = state
            .get_room_state(&host.room_code, Some(mark))
            .await
            .unwrap();
        assert_eq!(newer.events.len(), 1);
        assert_eq!(newer.events[0].kind.type_name(), "join_requested");
    }

    #[test]
    fn test_list_decks() {
        let state = state_with_deck(4);
        let decks = state.list_decks();
        assert_eq!(decks.len(), 1);
        assert_eq!(decks[0].id, "classic");
        assert_eq!(decks[0].title, "Classic");
    }
}
