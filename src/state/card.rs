use super::AppState;
use crate::error::GameError;
use crate::protocol::HandCard;
use crate::store::RoomRecord;
use crate::types::*;

/// Result of marking a card as said
#[derive(Debug, Clone, PartialEq)]
pub struct CardOutcome {
    pub finished: bool,
    pub winner: Option<String>,
}

impl RoomRecord {
    /// Move one of the caller's in-hand cards to a terminal state
    fn resolve_card(
        &mut self,
        player_id: PlayerId,
        card_id: CardId,
        state: CardState,
    ) -> Result<(), GameError> {
        let card = self.cards.get(&card_id).ok_or(GameError::CardNotFound)?;
        if card.owner_player_id != player_id {
            return Err(GameError::InvalidCard);
        }
        if card.state != CardState::InHand {
            return Err(GameError::CardAlreadyResolved);
        }
        self.ensure_playing()?;

        if let Some(card) = self.cards.get_mut(&card_id) {
            card.state = state;
            card.resolved_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    /// Name of the first player, by id, holding no in-hand cards
    fn first_empty_hand(&self) -> Option<String> {
        self.players
            .iter()
            .find(|p| self.in_hand_count(p.id) == 0)
            .map(|p| p.name.clone())
    }
}

impl AppState {
    pub async fn get_my_hand(&self, token: &str) -> Result<Vec<HandCard>, GameError> {
        self.read_as_player(token, |record, player_id| {
            Ok(record.hand_view(&self.catalog, player_id))
        })
        .await
    }

    /// Mark a card as said without being caught. Afterwards the first player
    /// with an empty hand wins and the room finishes.
    pub async fn mark_success(&self, token: &str, card_id: CardId) -> Result<CardOutcome, GameError> {
        self.mutate_as_player(token, |record, player_id| {
            record.resolve_card(player_id, card_id, CardState::Success)?;
            let player = record.player_name(player_id);
            record.push_event(EventKind::CardSuccess { player, card_id });

            let Some(winner) = record.first_empty_hand() else {
                return Ok(CardOutcome {
                    finished: false,
                    winner: None,
                });
            };

            record.room.status = RoomStatus::Finished;
            record.push_event(EventKind::GameFinished {
                winner: winner.clone(),
            });
            tracing::info!(room = %record.room.code, winner = %winner, "Game finished");

            Ok(CardOutcome {
                finished: true,
                winner: Some(winner),
            })
        })
        .await
    }

    /// Give up on a card and draw a replacement if the deck allows
    pub async fn mark_voided(&self, token: &str, card_id: CardId) -> Result<(), GameError> {
        self.mutate_as_player(token, |record, player_id| {
            record.resolve_card(player_id, card_id, CardState::Voided)?;
            let player = record.player_name(player_id);
            record.push_event(EventKind::CardVoided {
                player: player.clone(),
                card_id,
            });

            if let Some(card) = record.deal_one(&self.catalog, player_id) {
                record.push_event(EventKind::CardReplaced {
                    player,
                    card_id: card.id,
                });
            }
            Ok(())
        })
        .await
    }

    pub async fn get_new_card(&self, token: &str) -> Result<HandCard, GameError> {
        self.mutate_as_player(token, |record, player_id| {
            record.ensure_playing()?;
            let card = record
                .deal_one(&self.catalog, player_id)
                .ok_or(GameError::DeckExhausted)?;

            record.push_event(EventKind::NewCard {
                player: record.player_name(player_id),
                card_id: card.id,
            });
            Ok(HandCard {
                card_id: card.id,
                phrase: self.catalog.phrase_text(card.phrase_id).to_string(),
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::state_with_deck;
    use crate::state::NewRoom;

    async fn started(state: &AppState) -> NewRoom {
        let host = state.create_room("Host", None).await.unwrap();
        state.start_game(&host.player_token).await.unwrap();
        host
    }

    #[tokio::test]
    async fn test_mark_success_twice_fails() {
        let state = state_with_deck(20);
        let host = started(&state).await;
        let card_id = state.get_my_hand(&host.player_token).await.unwrap()[0].card_id;

        let outcome = state.mark_success(&host.player_token, card_id).await.unwrap();
        assert!(!outcome.finished);
        assert_eq!(outcome.winner, None);

        let result = state.mark_success(&host.player_token, card_id).await;
        assert!(matches!(result, Err(GameError::CardAlreadyResolved)));
    }

    #[tokio::test]
    async fn test_emptying_hand_finishes_once() {
        let state = state_with_deck(5);
        let host = started(&state).await;
        let hand = state.get_my_hand(&host.player_token).await.unwrap();

        let mut outcome = None;
        for card in &hand {
            outcome = Some(state.mark_success(&host.player_token, card.card_id).await.unwrap());
        }
        assert_eq!(
            outcome,
            Some(CardOutcome {
                finished: true,
                winner: Some("Host".to_string()),
            })
        );

        let snapshot = state.get_room_state(&host.room_code, None).await.unwrap();
        assert_eq!(snapshot.room.status, RoomStatus::Finished);
        let finishes = snapshot
            .events
            .iter()
            .filter(|e| e.kind.type_name() == "game_finished")
            .count();
        assert_eq!(finishes, 1);
    }

    #[tokio::test]
    async fn test_player_emptied_by_voiding_wins_on_next_success() {
        let state = state_with_deck(10);
        let host = state.create_room("Host", None).await.unwrap();
        let ana = state.join_room(&host.room_code, "Ana").await.unwrap();
        let request_id = state.list_requests(&host.player_token).await.unwrap()[0].id;
        state
            .respond_join_request(&host.player_token, request_id, "new", None)
            .await
            .unwrap();
        state.start_game(&host.player_token).await.unwrap();

        // Deck is spent, so voiding empties the host's hand
        for card in state.get_my_hand(&host.player_token).await.unwrap() {
            state.mark_voided(&host.player_token, card.card_id).await.unwrap();
        }
        assert!(state.get_my_hand(&host.player_token).await.unwrap().is_empty());

        let ana_card = state.get_my_hand(&ana.player_token).await.unwrap()[0].card_id;
        let outcome = state.mark_success(&ana.player_token, ana_card).await.unwrap();
        assert_eq!(
            outcome,
            CardOutcome {
                finished: true,
                winner: Some("Host".to_string()),
            }
        );

        let snapshot = state.get_room_state(&host.room_code, None).await.unwrap();
        assert_eq!(snapshot.room.status, RoomStatus::Finished);
        assert_eq!(
            snapshot.events.last().unwrap().kind,
            EventKind::GameFinished {
                winner: "Host".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_finished_room_is_frozen() {
        let state = state_with_deck(1);
        let host = started(&state).await;
        let card_id = state.get_my_hand(&host.player_token).await.unwrap()[0].card_id;
        state.mark_success(&host.player_token, card_id).await.unwrap();

        assert!(matches!(
            state.get_new_card(&host.player_token).await,
            Err(GameError::GameFinished)
        ));
        assert!(matches!(
            state.join_room(&host.room_code, "Late").await,
            Err(GameError::GameFinished)
        ));
        // Reads still work
        assert!(state.get_my_hand(&host.player_token).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_or_missing_card() {
        let state = state_with_deck(20);
        let host = state.create_room("Host", None).await.unwrap();
        let ana = state.join_room(&host.room_code, "Ana").await.unwrap();
        let request_id = state.list_requests(&host.player_token).await.unwrap()[0].id;
        state
            .respond_join_request(&host.player_token, request_id, "new", None)
            .await
            .unwrap();
        state.start_game(&host.player_token).await.unwrap();

        let ana_card = state.get_my_hand(&ana.player_token).await.unwrap()[0].card_id;
        assert!(matches!(
            state.mark_success(&host.player_token, ana_card).await,
            Err(GameError::InvalidCard)
        ));
        assert!(matches!(
            state.mark_voided(&host.player_token, 9_999).await,
            Err(GameError::CardNotFound)
        ));
    }

    #[tokio::test]
    async fn test_cards_require_playing_room() {
        let state = state_with_deck(20);
        let host = state.create_room("Host", None).await.unwrap();

        assert!(matches!(
            state.get_new_card(&host.player_token).await,
            Err(GameError::GameNotStarted)
        ));
    }

    #[tokio::test]
    async fn test_mark_voided_replaces_card() {
        let state = state_with_deck(6);
        let host = started(&state).await;
        let hand = state.get_my_hand(&host.player_token).await.unwrap();

        state.mark_voided(&host.player_token, hand[0].card_id).await.unwrap();
        let after = state.get_my_hand(&host.player_token).await.unwrap();
        assert_eq!(after.len(), 5);
        assert!(after.iter().all(|c| c.card_id != hand[0].card_id));

        let snapshot = state.get_room_state(&host.room_code, None).await.unwrap();
        let types: Vec<_> = snapshot.events.iter().map(|e| e.kind.type_name()).collect();
        assert!(types.ends_with(&["card_voided", "card_replaced"]));

        // Deck is now empty: voiding shrinks the hand
        state.mark_voided(&host.player_token, after[0].card_id).await.unwrap();
        assert_eq!(state.get_my_hand(&host.player_token).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_get_new_card_until_exhausted() {
        let state = state_with_deck(6);
        let host = started(&state).await;

        let card = state.get_new_card(&host.player_token).await.unwrap();
        assert!(card.phrase.starts_with("phrase "));
        assert!(matches!(
            state.get_new_card(&host.player_token).await,
            Err(GameError::DeckExhausted)
        ));
        assert_eq!(state.get_my_hand(&host.player_token).await.unwrap().len(), 6);
    }
}
