use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-room numeric ids. Rooms themselves are keyed by their code.
pub type RoomCode = String;
pub type PlayerId = u64;
pub type CardId = u64;
pub type RequestId = u64;
pub type EventId = u64;
pub type PhraseId = u64;
pub type DeckId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Lobby,
    Playing,
    Finished,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Lobby => "lobby",
            RoomStatus::Playing => "playing",
            RoomStatus::Finished => "finished",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lobby" => Some(RoomStatus::Lobby),
            "playing" => Some(RoomStatus::Playing),
            "finished" => Some(RoomStatus::Finished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub status: RoomStatus,
    pub active_deck_id: DeckId,
    pub host_player_id: PlayerId,
    /// Always "host" for now; kept so clients can render moderation UI.
    pub permissions_mode: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Capability credential. Possession is full authentication.
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    InHand,
    Success,
    Voided,
}

impl CardState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardState::InHand => "in_hand",
            CardState::Success => "success",
            CardState::Voided => "voided",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_hand" => Some(CardState::InHand),
            "success" => Some(CardState::Success),
            "voided" => Some(CardState::Voided),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub owner_player_id: PlayerId,
    pub phrase_id: PhraseId,
    pub state: CardState,
    pub assigned_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Handled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Handled => "handled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "handled" => Some(RequestStatus::Handled),
            _ => None,
        }
    }
}

/// Host decision recorded on a join request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JoinDecision {
    Accepted,
    Rejected,
}

/// Request type plus its type-specific payload.
///
/// Serialized adjacently as `{"type": "...", "payload": {...}}`, which is
/// both the wire shape handed to the host and the persisted shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum RequestKind {
    Join {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decision: Option<JoinDecision>,
    },
    Swap {
        player_name: String,
        player_id: PlayerId,
        card_id: CardId,
        phrase: String,
        reason: String,
    },
    Accusation {
        player_name: String,
        accused_id: PlayerId,
        accused_name: String,
        reason: String,
    },
}

impl RequestKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            RequestKind::Join { .. } => "join",
            RequestKind::Swap { .. } => "swap",
            RequestKind::Accusation { .. } => "accusation",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub id: RequestId,
    pub status: RequestStatus,
    #[serde(flatten)]
    pub kind: RequestKind,
    pub created_at: DateTime<Utc>,
    /// Pending credential of a join request. Never sent to the host.
    #[serde(skip)]
    pub join_token: Option<String>,
}

/// How an accepted join request was applied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    New,
    Replace,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum EventKind {
    RoomCreated { host: String, deck_id: DeckId },
    JoinRequested { name: String },
    JoinRejected { name: String },
    JoinAccepted { name: String, mode: JoinMode },
    PlayerJoined { name: String },
    GameStarted {},
    GameFinished { winner: String },
    CardSuccess { player: String, card_id: CardId },
    CardVoided { player: String, card_id: CardId },
    CardReplaced { player: String, card_id: CardId },
    NewCard { player: String, card_id: CardId },
    SwapRequested { player: String, phrase: String },
    SwapAccepted { player: String, phrase: String },
    SwapRejected { player: String, phrase: String },
    AccusationRequested { player: String, accused: String },
    AccusationPenalized { player: String, accused: String },
    AccusationDismissed { player: String, accused: String },
    PlayerPenalized { player: String, reason: String },
}

impl EventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::RoomCreated { .. } => "room_created",
            EventKind::JoinRequested { .. } => "join_requested",
            EventKind::JoinRejected { .. } => "join_rejected",
            EventKind::JoinAccepted { .. } => "join_accepted",
            EventKind::PlayerJoined { .. } => "player_joined",
            EventKind::GameStarted {} => "game_started",
            EventKind::GameFinished { .. } => "game_finished",
            EventKind::CardSuccess { .. } => "card_success",
            EventKind::CardVoided { .. } => "card_voided",
            EventKind::CardReplaced { .. } => "card_replaced",
            EventKind::NewCard { .. } => "new_card",
            EventKind::SwapRequested { .. } => "swap_requested",
            EventKind::SwapAccepted { .. } => "swap_accepted",
            EventKind::SwapRejected { .. } => "swap_rejected",
            EventKind::AccusationRequested { .. } => "accusation_requested",
            EventKind::AccusationPenalized { .. } => "accusation_penalized",
            EventKind::AccusationDismissed { .. } => "accusation_dismissed",
            EventKind::PlayerPenalized { .. } => "player_penalized",
        }
    }
}

/// Notification record for polling clients. Ids are monotonic per room and
/// never reused, so clients can keep a high-water mark.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: EventId,
    #[serde(flatten)]
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
}

/// Tunable game rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRules {
    /// Cards dealt to each player on game start or join
    pub hand_size: usize,
}

impl Default for GameRules {
    fn default() -> Self {
        Self { hand_size: 5 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_kind_wire_shape() {
        let kind = RequestKind::Swap {
            player_name: "Ana".to_string(),
            player_id: 2,
            card_id: 7,
            phrase: "at the end of the day".to_string(),
            reason: "too hard".to_string(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "swap");
        assert_eq!(json["payload"]["playerName"], "Ana");
        assert_eq!(json["payload"]["cardId"], 7);
    }

    #[test]
    fn test_event_flattens_type_and_payload() {
        let event = Event {
            id: 3,
            kind: EventKind::GameFinished {
                winner: "Ana".to_string(),
            },
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["type"], "game_finished");
        assert_eq!(json["payload"]["winner"], "Ana");
        assert!(json["created_at"].is_string());
    }

    #[test]
    fn test_event_type_names_match_serde_tags() {
        let kinds = [
            EventKind::GameStarted {},
            EventKind::NewCard {
                player: "x".to_string(),
                card_id: 1,
            },
            EventKind::JoinAccepted {
                name: "x".to_string(),
                mode: JoinMode::Replace,
            },
        ];
        for kind in kinds {
            let json = serde_json::to_value(&kind).unwrap();
            assert_eq!(json["type"], kind.type_name());
        }
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [RoomStatus::Lobby, RoomStatus::Playing, RoomStatus::Finished] {
            assert_eq!(RoomStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CardState::parse("in_hand"), Some(CardState::InHand));
        assert_eq!(RequestStatus::parse("bogus"), None);
    }
}
