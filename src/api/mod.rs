//! HTTP surface: a single `POST /api` action endpoint.
//!
//! Clients send `{"action": "...", ...params}` and always get back a JSON
//! object with an `ok` flag, either next to the action's payload or next to
//! an `error` message.

pub mod handlers;

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::error::GameError;
use crate::protocol::{Action, Envelope, ACTIONS};
use crate::state::AppState;

/// Build the application router. When `static_dir` is set, unknown paths are
/// served from it so the presentation client can live next to the API.
pub fn router(state: Arc<AppState>, static_dir: Option<PathBuf>) -> Router {
    let app = Router::new()
        .route("/api", post(action_handler))
        .route("/healthz", get(healthz));

    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app,
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// POST /api
async fn action_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let action = match parse_action(&body) {
        Ok(action) => action,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected action body");
            return e.into_response();
        }
    };

    match handlers::handle_action(action, &state).await {
        Ok(reply) => Json(Envelope::from(reply)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Decode an action body.
///
/// An absent or unrecognised `action` is reported as an unknown action;
/// a known action with missing or mistyped parameters is invalid input.
pub fn parse_action(body: &[u8]) -> Result<Action, GameError> {
    let value: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(body)
            .map_err(|e| GameError::InvalidInput(format!("malformed JSON: {e}")))?
    };

    let name = value
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !ACTIONS.contains(&name) {
        return Err(GameError::UnknownAction(name.to_string()));
    }

    serde_json::from_value(value).map_err(|e| GameError::InvalidInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_action() {
        let action = parse_action(br#"{"action":"getMyHand","token":"abc"}"#).unwrap();
        assert!(matches!(action, Action::GetMyHand { token } if token == "abc"));
    }

    #[test]
    fn test_missing_or_unknown_action() {
        assert!(matches!(
            parse_action(b""),
            Err(GameError::UnknownAction(name)) if name.is_empty()
        ));
        assert!(matches!(
            parse_action(br#"{"action":"dance"}"#),
            Err(GameError::UnknownAction(name)) if name == "dance"
        ));
        assert!(matches!(
            parse_action(br#"{"action":42}"#),
            Err(GameError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_bad_params_are_invalid_input() {
        assert!(matches!(
            parse_action(br#"{"action":"markSuccess","token":"t"}"#),
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_action(br#"{"action":"markSuccess","token":"t","cardId":"x"}"#),
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_action(b"{not json"),
            Err(GameError::InvalidInput(_))
        ));
    }
}
