//! Error taxonomy for game actions and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("room not found")]
    RoomNotFound,

    #[error("player not found")]
    PlayerNotFound,

    #[error("card not found")]
    CardNotFound,

    #[error("request not found")]
    RequestNotFound,

    #[error("deck not found")]
    DeckNotFound,

    #[error("invalid card")]
    InvalidCard,

    #[error("card already resolved")]
    CardAlreadyResolved,

    #[error("request already resolved")]
    RequestAlreadyResolved,

    #[error("invalid request")]
    WrongRequestType,

    #[error("game has not started")]
    GameNotStarted,

    #[error("game already started")]
    GameAlreadyStarted,

    #[error("game already finished")]
    GameFinished,

    #[error("deck exhausted")]
    DeckExhausted,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid token")]
    InvalidToken,

    #[error("only the host can {0}")]
    NotHost(&'static str),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("could not generate a unique room code")]
    CodeSpaceExhausted,

    #[error("{0}")]
    Store(#[from] StoreError),
}

impl GameError {
    pub fn status_code(&self) -> StatusCode {
        use GameError::*;

        match self {
            RoomNotFound | PlayerNotFound | CardNotFound | RequestNotFound | DeckNotFound
            | UnknownAction(_) => StatusCode::NOT_FOUND,
            InvalidCard | CardAlreadyResolved | RequestAlreadyResolved | WrongRequestType
            | GameNotStarted | GameAlreadyStarted | GameFinished | DeckExhausted
            | InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            InvalidToken | NotHost(_) => StatusCode::FORBIDDEN,
            CodeSpaceExhausted | Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Action failed");
        }
        (
            status,
            Json(json!({ "ok": false, "error": self.to_string() })),
        )
            .into_response()
    }
}
