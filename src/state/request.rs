//! Moderation queue: join, swap and accusation requests answered by the host

use super::{text_or, AppState};
use crate::auth;
use crate::error::GameError;
use crate::protocol::JoinResolution;
use crate::store::RoomRecord;
use crate::types::*;

const HOST_RESOLVES: &str = "resolve requests";

impl RoomRecord {
    pub fn push_request(&mut self, kind: RequestKind, join_token: Option<String>) -> RequestId {
        let id = self.next_request_id;
        self.next_request_id += 1;
        self.requests.push(Request {
            id,
            status: RequestStatus::Pending,
            kind,
            created_at: chrono::Utc::now(),
            join_token,
        });
        id
    }

    /// Take a pending request of the expected type and mark it handled
    fn claim_request(
        &mut self,
        request_id: RequestId,
        expected: &'static str,
    ) -> Result<&mut Request, GameError> {
        let request = self
            .requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or(GameError::RequestNotFound)?;
        if request.status != RequestStatus::Pending {
            return Err(GameError::RequestAlreadyResolved);
        }
        if request.kind.type_name() != expected {
            return Err(GameError::WrongRequestType);
        }

        request.status = RequestStatus::Handled;
        Ok(request)
    }

    pub fn pending_requests(&self) -> Vec<Request> {
        self.requests
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .cloned()
            .collect()
    }
}

impl AppState {
    /// Pending requests of the host's room, oldest first
    pub async fn list_requests(&self, token: &str) -> Result<Vec<Request>, GameError> {
        self.read_as_player(token, |record, player_id| {
            record.require_host(player_id, "list requests")?;
            Ok(record.pending_requests())
        })
        .await
    }

    /// Ask the host to swap one of the caller's cards
    pub async fn request_card_swap(
        &self,
        token: &str,
        card_id: CardId,
        reason: &str,
    ) -> Result<RequestId, GameError> {
        let reason = text_or(reason, "No reason given");

        self.mutate_as_player(token, |record, player_id| {
            record.ensure_not_finished()?;
            let card = record.cards.get(&card_id).ok_or(GameError::CardNotFound)?;
            if card.owner_player_id != player_id {
                return Err(GameError::InvalidCard);
            }

            let phrase = self.catalog.phrase_text(card.phrase_id).to_string();
            let player_name = record.player_name(player_id);
            let request_id = record.push_request(
                RequestKind::Swap {
                    player_name: player_name.clone(),
                    player_id,
                    card_id,
                    phrase: phrase.clone(),
                    reason,
                },
                None,
            );
            record.push_event(EventKind::SwapRequested {
                player: player_name,
                phrase,
            });
            Ok(request_id)
        })
        .await
    }

    pub async fn respond_card_swap(
        &self,
        token: &str,
        request_id: RequestId,
        accept: bool,
    ) -> Result<(), GameError> {
        self.mutate_as_host(token, HOST_RESOLVES, |record, _| {
            record.ensure_not_finished()?;
            let RequestKind::Swap {
                player_name,
                player_id,
                card_id,
                phrase,
                ..
            } = record.claim_request(request_id, "swap")?.kind.clone()
            else {
                return Err(GameError::WrongRequestType);
            };

            if !accept {
                record.push_event(EventKind::SwapRejected {
                    player: player_name,
                    phrase,
                });
                return Ok(());
            }

            // The card is voided whatever state it reached since the request
            if let Some(card) = record.cards.get_mut(&card_id) {
                card.state = CardState::Voided;
                card.resolved_at = Some(chrono::Utc::now());
            }
            record.deal_one(&self.catalog, player_id);
            record.push_event(EventKind::SwapAccepted {
                player: player_name,
                phrase,
            });

            tracing::info!(room = %record.room.code, request_id, card_id, "Swap accepted");
            Ok(())
        })
        .await
    }

    /// Accuse another player of being caught saying their phrase
    pub async fn request_accusation(
        &self,
        token: &str,
        accused_player_id: PlayerId,
        reason: &str,
    ) -> Result<RequestId, GameError> {
        let reason = text_or(reason, "No reason given");

        self.mutate_as_player(token, |record, player_id| {
            record.ensure_not_finished()?;
            let accused_name = record
                .player(accused_player_id)
                .map(|p| p.name.clone())
                .ok_or(GameError::PlayerNotFound)?;

            let player_name = record.player_name(player_id);
            let request_id = record.push_request(
                RequestKind::Accusation {
                    player_name: player_name.clone(),
                    accused_id: accused_player_id,
                    accused_name: accused_name.clone(),
                    reason,
                },
                None,
            );
            record.push_event(EventKind::AccusationRequested {
                player: player_name,
                accused: accused_name,
            });
            Ok(request_id)
        })
        .await
    }

    /// `decision` "penalize" deals the accused one extra card; anything else
    /// dismisses the accusation
    pub async fn respond_accusation(
        &self,
        token: &str,
        request_id: RequestId,
        decision: &str,
    ) -> Result<(), GameError> {
        self.mutate_as_host(token, HOST_RESOLVES, |record, _| {
            record.ensure_not_finished()?;
            let RequestKind::Accusation {
                player_name,
                accused_id,
                accused_name,
                ..
            } = record.claim_request(request_id, "accusation")?.kind.clone()
            else {
                return Err(GameError::WrongRequestType);
            };

            let penalize = decision.trim() == "penalize";
            if penalize {
                if record.player(accused_id).is_some() {
                    record.deal_one(&self.catalog, accused_id);
                }
                record.push_event(EventKind::AccusationPenalized {
                    player: player_name,
                    accused: accused_name,
                });
            } else {
                record.push_event(EventKind::AccusationDismissed {
                    player: player_name,
                    accused: accused_name,
                });
            }

            tracing::info!(room = %record.room.code, request_id, penalize, "Accusation resolved");
            Ok(())
        })
        .await
    }

    /// Admit, reject or merge a pending joiner.
    ///
    /// `mode` is "reject", "replace" (requires `replace_player_id`) or
    /// anything else to admit a new player.
    pub async fn respond_join_request(
        &self,
        token: &str,
        request_id: RequestId,
        mode: &str,
        replace_player_id: Option<PlayerId>,
    ) -> Result<(), GameError> {
        let resolution = JoinResolution::parse(mode);
        let hand_size = self.rules.hand_size;

        self.mutate_as_host(token, HOST_RESOLVES, |record, _| {
            record.ensure_not_finished()?;
            let request = record.claim_request(request_id, "join")?;
            let join_token = request.join_token.clone();
            let RequestKind::Join { name, decision } = &mut request.kind else {
                return Err(GameError::WrongRequestType);
            };
            let name = name.clone();
            *decision = Some(match resolution {
                JoinResolution::Reject => JoinDecision::Rejected,
                JoinResolution::Replace | JoinResolution::New => JoinDecision::Accepted,
            });

            // A request without a pending credential gets a fresh one
            let join_token = join_token.unwrap_or_else(auth::generate_token);

            match resolution {
                JoinResolution::Reject => {
                    record.push_event(EventKind::JoinRejected { name });
                }
                JoinResolution::Replace => {
                    let target = replace_player_id.ok_or_else(|| {
                        GameError::InvalidInput("replacePlayerId is required".to_string())
                    })?;
                    let player = record.player_mut(target).ok_or(GameError::PlayerNotFound)?;
                    player.name = name.clone();
                    player.token = join_token;
                    player.created_at = chrono::Utc::now();
                    record.push_event(EventKind::JoinAccepted {
                        name,
                        mode: JoinMode::Replace,
                    });
                }
                JoinResolution::New => {
                    let player_id = record.next_player_id;
                    record.next_player_id += 1;
                    record.players.push(Player {
                        id: player_id,
                        name: name.clone(),
                        token: join_token,
                        created_at: chrono::Utc::now(),
                    });
                    record.deal_up_to(&self.catalog, player_id, hand_size);
                    record.push_event(EventKind::PlayerJoined { name: name.clone() });
                    record.push_event(EventKind::JoinAccepted {
                        name,
                        mode: JoinMode::New,
                    });
                }
            }

            tracing::info!(room = %record.room.code, request_id, ?resolution, "Join request resolved");
            Ok(())
        })
        .await
    }

    /// Deal a penalty card to any player of the host's room
    pub async fn penalize_player(
        &self,
        token: &str,
        player_id: PlayerId,
        reason: &str,
    ) -> Result<(), GameError> {
        let reason = text_or(reason, "No reason");

        self.mutate_as_host(token, "penalize players", |record, _| {
            record.ensure_not_finished()?;
            let name = record
                .player(player_id)
                .map(|p| p.name.clone())
                .ok_or(GameError::PlayerNotFound)?;

            record.deal_one(&self.catalog, player_id);
            record.push_event(EventKind::PlayerPenalized {
                player: name,
                reason,
            });

            tracing::info!(room = %record.room.code, player_id, "Player penalized");
            Ok(())
        })
        .await
    }
}
