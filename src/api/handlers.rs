//! Action dispatch
//!
//! Maps each decoded [`Action`] onto the matching [`AppState`] operation and
//! shapes its result as a [`Reply`]. Authorization lives in the state layer.

use std::sync::Arc;

use crate::error::GameError;
use crate::protocol::{Action, JoinStatus, Reply};
use crate::state::AppState;

/// Run one action to completion
pub async fn handle_action(action: Action, state: &Arc<AppState>) -> Result<Reply, GameError> {
    match action {
        // Room lifecycle
        Action::CreateRoom { name, deck_id } => {
            let created = state.create_room(&name, deck_id.as_deref()).await?;
            Ok(Reply::RoomCreated {
                room_code: created.room_code,
                player_token: created.player_token,
                player_id: created.player_id,
            })
        }

        Action::JoinRoom { code, name } => {
            let ticket = state.join_room(&code, &name).await?;
            Ok(Reply::JoinRequested {
                room_code: ticket.room_code,
                player_token: ticket.player_token,
                status: JoinStatus::Pending,
            })
        }

        Action::GetRoomState {
            code,
            after_event_id,
        } => {
            let snapshot = state.get_room_state(&code, after_event_id).await?;
            Ok(Reply::RoomState {
                room: snapshot.room,
                players: snapshot.players,
                events: snapshot.events,
            })
        }

        Action::GetJoinStatus { token } => {
            let (status, room_code) = state.get_join_status(&token).await?;
            Ok(Reply::JoinStatus { status, room_code })
        }

        Action::StartGame { token } => {
            state.start_game(&token).await?;
            Ok(Reply::Done {})
        }

        Action::ListDecks {} => Ok(Reply::Decks {
            decks: state.list_decks(),
        }),

        // Cards
        Action::GetMyHand { token } => Ok(Reply::Hand {
            hand: state.get_my_hand(&token).await?,
        }),

        Action::MarkSuccess { token, card_id } => {
            let outcome = state.mark_success(&token, card_id).await?;
            Ok(Reply::CardResolved {
                finished: outcome.finished,
                winner: outcome.winner,
            })
        }

        Action::MarkVoided { token, card_id } => {
            state.mark_voided(&token, card_id).await?;
            Ok(Reply::Done {})
        }

        Action::GetNewCard { token } => Ok(Reply::NewCard {
            card: state.get_new_card(&token).await?,
        }),

        // Moderation
        Action::ListRequests { token } => Ok(Reply::Requests {
            requests: state.list_requests(&token).await?,
        }),

        Action::RequestCardSwap {
            token,
            card_id,
            reason,
        } => Ok(Reply::RequestCreated {
            request_id: state.request_card_swap(&token, card_id, &reason).await?,
        }),

        Action::RespondCardSwap {
            token,
            request_id,
            accept,
        } => {
            state.respond_card_swap(&token, request_id, accept).await?;
            Ok(Reply::Done {})
        }

        Action::RequestAccusation {
            token,
            accused_player_id,
            reason,
        } => Ok(Reply::RequestCreated {
            request_id: state
                .request_accusation(&token, accused_player_id, &reason)
                .await?,
        }),

        Action::RespondAccusation {
            token,
            request_id,
            decision,
        } => {
            state
                .respond_accusation(&token, request_id, &decision)
                .await?;
            Ok(Reply::Done {})
        }

        Action::RespondJoinRequest {
            token,
            request_id,
            mode,
            replace_player_id,
        } => {
            state
                .respond_join_request(&token, request_id, &mode, replace_player_id)
                .await?;
            Ok(Reply::Done {})
        }

        Action::PenalizePlayer {
            token,
            player_id,
            reason,
        } => {
            state.penalize_player(&token, player_id, &reason).await?;
            Ok(Reply::Done {})
        }
    }
}
