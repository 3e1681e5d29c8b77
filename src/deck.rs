use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::role::{Role, ROLE_VARIANTS};

/// A single influence card. Two cards of the same role are distinct
/// instances; `id` is what a player points at when choosing which card
/// to give up.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub role: Role,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardId(pub u8);

/// The court deck: three cards per role, one burned face-down at
/// construction and never seen again, a shuffled draw pile, and the
/// public append-only revealed pile.
///
/// Census invariant: `size() + revealed().len() + 1 + Σ hand sizes == 15`
/// in every reachable state.
#[derive(Clone, Debug)]
pub struct Deck {
    draw_pile: Vec<Card>,
    burned: Card,
    revealed: Vec<Card>,
}

impl Deck {
    pub fn new<R: Rng + Sized>(rng: &mut R) -> Self {
        let mut draw_pile: Vec<Card> = ROLE_VARIANTS
            .iter()
            .flat_map(|&role| std::iter::repeat(role).take(3))
            .enumerate()
            .map(|(id, role)| Card {
                id: CardId(id as u8),
                role,
            })
            .collect();

        draw_pile.shuffle(rng);
        let burned = draw_pile.pop().expect("a fresh deck holds 15 cards");

        Self {
            draw_pile,
            burned,
            revealed: Vec::new(),
        }
    }

    /// Unreachable under correct play: the card universe always covers
    /// every hand in the match.
    pub fn draw(&mut self) -> Result<Card, GameError> {
        self.draw_pile.pop().ok_or(GameError::EmptyDeck)
    }

    /// Reinsert a card face-down and reshuffle, keeping its identity
    /// hidden. Used for exchanges and won challenges.
    pub fn return_to_deck<R: Rng + Sized>(&mut self, card: Card, rng: &mut R) {
        self.draw_pile.push(card);
        self.draw_pile.shuffle(rng);
    }

    /// Append a lost influence card to the public pile. Permanent.
    pub fn return_revealed(&mut self, card: Card) {
        self.revealed.push(card);
    }

    pub fn size(&self) -> usize {
        self.draw_pile.len()
    }

    pub fn revealed(&self) -> &[Card] {
        &self.revealed
    }

    /// Cards accounted for by the deck itself (draw pile + revealed +
    /// the burned card). The match adds hand sizes to check the census.
    pub(crate) fn census(&self) -> usize {
        self.draw_pile
            .iter()
            .chain(self.revealed.iter())
            .chain(std::iter::once(&self.burned))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn burned(&self) -> Card {
        self.burned
    }

    /// Pull a specific role out of the draw pile, for tests that rig a
    /// hand while keeping the census intact.
    #[cfg(test)]
    pub(crate) fn remove_role(&mut self, role: Role) -> Option<Card> {
        let idx = self.draw_pile.iter().position(|c| c.role == role)?;
        Some(self.draw_pile.remove(idx))
    }
}
