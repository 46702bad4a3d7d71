//! Card dealing
//!
//! Each phrase is dealt at most once per room. A phrase is retired the moment
//! it is dealt, whatever later happens to the card.

use rand::Rng;

use crate::catalog::Catalog;
use crate::protocol::HandCard;
use crate::store::RoomRecord;
use crate::types::*;

impl RoomRecord {
    /// Phrases of the active deck not yet dealt in this room, in deck order
    fn undealt_phrases(&self, catalog: &Catalog) -> Vec<PhraseId> {
        let Some(deck) = catalog.deck(&self.room.active_deck_id) else {
            tracing::warn!(
                room = %self.room.code,
                deck = %self.room.active_deck_id,
                "Active deck missing from catalog"
            );
            return Vec::new();
        };
        deck.phrase_ids
            .iter()
            .copied()
            .filter(|id| !self.used_phrase_ids.contains(id))
            .collect()
    }

    /// Deal one random undealt phrase to `player_id`.
    ///
    /// Returns `None` when the deck is exhausted.
    pub fn deal_one(&mut self, catalog: &Catalog, player_id: PlayerId) -> Option<Card> {
        let pool = self.undealt_phrases(catalog);
        if pool.is_empty() {
            return None;
        }

        let phrase_id = pool[rand::rng().random_range(0..pool.len())];
        self.used_phrase_ids.insert(phrase_id);

        let card = Card {
            id: self.next_card_id,
            owner_player_id: player_id,
            phrase_id,
            state: CardState::InHand,
            assigned_at: chrono::Utc::now(),
            resolved_at: None,
        };
        self.next_card_id += 1;
        self.cards.insert(card.id, card.clone());
        Some(card)
    }

    /// Deal until the player holds `target` cards or the deck runs out.
    /// Returns the number of cards dealt.
    pub fn deal_up_to(&mut self, catalog: &Catalog, player_id: PlayerId, target: usize) -> usize {
        let need = target.saturating_sub(self.in_hand_count(player_id));
        let mut dealt = 0;
        while dealt < need && self.deal_one(catalog, player_id).is_some() {
            dealt += 1;
        }
        if dealt < need {
            tracing::info!(
                room = %self.room.code,
                player_id,
                dealt,
                need,
                "Deck ran out while dealing"
            );
        }
        dealt
    }

    pub fn in_hand(&self, player_id: PlayerId) -> impl Iterator<Item = &Card> {
        self.cards
            .values()
            .filter(move |c| c.owner_player_id == player_id && c.state == CardState::InHand)
    }

    pub fn in_hand_count(&self, player_id: PlayerId) -> usize {
        self.in_hand(player_id).count()
    }

    /// The player's in-hand cards with phrase text, ordered by card id
    pub fn hand_view(&self, catalog: &Catalog, player_id: PlayerId) -> Vec<HandCard> {
        self.in_hand(player_id)
            .map(|c| HandCard {
                card_id: c.id,
                phrase: catalog.phrase_text(c.phrase_id).to_string(),
            })
            .collect()
    }
}
