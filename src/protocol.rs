use crate::types::*;
use serde::{Deserialize, Serialize};

/// Every action name the dispatch endpoint understands
pub const ACTIONS: &[&str] = &[
    "createRoom",
    "joinRoom",
    "getRoomState",
    "getJoinStatus",
    "startGame",
    "getMyHand",
    "markSuccess",
    "markVoided",
    "getNewCard",
    "listDecks",
    "listRequests",
    "requestCardSwap",
    "respondCardSwap",
    "requestAccusation",
    "respondAccusation",
    "respondJoinRequest",
    "penalizePlayer",
];

/// Request body of `POST /api`: `{"action": "...", ...params}`.
///
/// Missing tokens deserialize as empty strings so they fail as bad
/// credentials rather than as malformed input.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    CreateRoom {
        #[serde(default)]
        name: String,
        #[serde(default)]
        deck_id: Option<DeckId>,
    },
    JoinRoom {
        #[serde(default)]
        code: String,
        #[serde(default)]
        name: String,
    },
    GetRoomState {
        #[serde(default)]
        code: String,
        /// Only return events newer than this id
        #[serde(default)]
        after_event_id: Option<EventId>,
    },
    GetJoinStatus {
        #[serde(default)]
        token: String,
    },
    StartGame {
        #[serde(default)]
        token: String,
    },
    GetMyHand {
        #[serde(default)]
        token: String,
    },
    MarkSuccess {
        #[serde(default)]
        token: String,
        card_id: CardId,
    },
    MarkVoided {
        #[serde(default)]
        token: String,
        card_id: CardId,
    },
    GetNewCard {
        #[serde(default)]
        token: String,
    },
    ListDecks {},
    ListRequests {
        #[serde(default)]
        token: String,
    },
    RequestCardSwap {
        #[serde(default)]
        token: String,
        card_id: CardId,
        #[serde(default)]
        reason: String,
    },
    RespondCardSwap {
        #[serde(default)]
        token: String,
        request_id: RequestId,
        #[serde(default)]
        accept: bool,
    },
    RequestAccusation {
        #[serde(default)]
        token: String,
        accused_player_id: PlayerId,
        #[serde(default)]
        reason: String,
    },
    /// `decision` is "penalize" or anything else to dismiss. It cannot be
    /// called `action` because that key selects the action itself.
    RespondAccusation {
        #[serde(default)]
        token: String,
        request_id: RequestId,
        #[serde(default)]
        decision: String,
    },
    RespondJoinRequest {
        #[serde(default)]
        token: String,
        request_id: RequestId,
        #[serde(default)]
        mode: String,
        #[serde(default)]
        replace_player_id: Option<PlayerId>,
    },
    PenalizePlayer {
        #[serde(default)]
        token: String,
        player_id: PlayerId,
        #[serde(default)]
        reason: String,
    },
}

/// How the host answers a join request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinResolution {
    Reject,
    Replace,
    New,
}

impl JoinResolution {
    /// Unrecognised modes admit the joiner as a new player
    pub fn parse(mode: &str) -> Self {
        match mode.trim() {
            "reject" => JoinResolution::Reject,
            "replace" => JoinResolution::Replace,
            _ => JoinResolution::New,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JoinStatus {
    Active,
    Pending,
    Rejected,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub status: RoomStatus,
    #[serde(rename = "activeDeckId")]
    pub active_deck_id: DeckId,
    pub permissions_mode: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HandCard {
    pub card_id: CardId,
    pub phrase: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeckInfo {
    pub id: DeckId,
    pub title: String,
    pub subtitle: String,
    pub image: Option<String>,
}

/// Success payload of an action, flattened next to `"ok": true`
#[derive(Debug, Clone, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum Reply {
    RoomCreated {
        room_code: RoomCode,
        player_token: String,
        player_id: PlayerId,
    },
    JoinRequested {
        room_code: RoomCode,
        player_token: String,
        status: JoinStatus,
    },
    RoomState {
        room: RoomInfo,
        players: Vec<PlayerInfo>,
        events: Vec<Event>,
    },
    JoinStatus {
        status: JoinStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_code: Option<RoomCode>,
    },
    Hand {
        hand: Vec<HandCard>,
    },
    CardResolved {
        finished: bool,
        winner: Option<String>,
    },
    NewCard {
        card: HandCard,
    },
    Decks {
        decks: Vec<DeckInfo>,
    },
    Requests {
        requests: Vec<Request>,
    },
    RequestCreated {
        request_id: RequestId,
    },
    Done {},
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub ok: bool,
    #[serde(flatten)]
    pub reply: Reply,
}

impl From<Reply> for Envelope {
    fn from(reply: Reply) -> Self {
        Self { ok: true, reply }
    }
}
