use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::deck::{Card, CardId};
use crate::error::GameError;
use crate::role::Role;

/// Opaque participant identity, assigned by the lobby.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

impl Display for PlayerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-participant state. Coins and hand are mutated only by the match
/// layer; presentation code sees counts, never hand contents.
#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub(crate) coins: u8,
    pub(crate) hand: Vec<Card>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            coins: 2,
            hand: Vec::with_capacity(2),
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.hand.is_empty()
    }

    pub fn coins(&self) -> u8 {
        self.coins
    }

    /// Number of influence cards still held.
    pub fn influence(&self) -> usize {
        self.hand.len()
    }

    pub fn holds_role(&self, role: Role) -> bool {
        self.hand.iter().any(|card| card.role == role)
    }

    /// Hand contents are private to the owner; only prompts addressed to
    /// this player may carry them out of the engine.
    pub(crate) fn hand(&self) -> &[Card] {
        &self.hand
    }

    pub(crate) fn gain_influence(&mut self, card: Card) -> Result<(), GameError> {
        if self.hand.len() >= 2 {
            return Err(GameError::HandOverflow);
        }
        self.hand.push(card);
        Ok(())
    }

    /// Remove and return one influence card.
    ///
    /// With two cards held the caller must name one (obtained through a
    /// card-choice prompt); with one the last card goes unconditionally.
    pub(crate) fn lose_influence(&mut self, choice: Option<CardId>) -> Result<Card, GameError> {
        match self.hand.len() {
            0 => Err(GameError::AlreadyEliminated),
            1 => Ok(self.hand.remove(0)),
            _ => {
                let id = choice.ok_or(GameError::AmbiguousChoice)?;
                let idx = self
                    .hand
                    .iter()
                    .position(|card| card.id == id)
                    .ok_or(GameError::InvalidMove)?;
                Ok(self.hand.remove(idx))
            }
        }
    }

    /// Remove the first held card of the given role, for the exchange
    /// that follows a won challenge.
    pub(crate) fn take_role(&mut self, role: Role) -> Option<Card> {
        let idx = self.hand.iter().position(|card| card.role == role)?;
        Some(self.hand.remove(idx))
    }

    pub(crate) fn gain_coins(&mut self, amount: u8) {
        self.coins += amount;
    }

    /// Fails without mutating when the player cannot afford it.
    pub(crate) fn spend_coins(&mut self, amount: u8) -> Result<(), GameError> {
        if amount > self.coins {
            return Err(GameError::InsufficientFunds);
        }
        self.coins -= amount;
        Ok(())
    }

    /// Clamps to the available balance and returns what was actually
    /// taken; a steal target may hold fewer than two coins.
    pub(crate) fn lose_coins(&mut self, amount: u8) -> u8 {
        let taken = amount.min(self.coins);
        self.coins -= taken;
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: u8, role: Role) -> Card {
        Card {
            id: CardId(id),
            role,
        }
    }

    fn player() -> Player {
        Player::new(PlayerId(123), "Wumpus")
    }

    #[test]
    fn starts_with_two_coins_and_no_hand() {
        let p = player();
        assert_eq!(p.coins(), 2);
        assert_eq!(p.influence(), 0);
        assert!(!p.is_alive());
    }

    #[test]
    fn gain_influence_caps_at_two() {
        let mut p = player();
        p.gain_influence(card(0, Role::Duke)).unwrap();
        p.gain_influence(card(1, Role::Captain)).unwrap();
        assert!(p.holds_role(Role::Duke));
        assert!(p.holds_role(Role::Captain));

        assert_eq!(
            p.gain_influence(card(2, Role::Contessa)),
            Err(GameError::HandOverflow)
        );
        assert_eq!(p.influence(), 2);
    }

    #[test]
    fn losing_from_two_cards_needs_a_choice() {
        let mut p = player();
        p.gain_influence(card(0, Role::Duke)).unwrap();
        p.gain_influence(card(1, Role::Captain)).unwrap();

        assert_eq!(p.lose_influence(None), Err(GameError::AmbiguousChoice));
        assert_eq!(
            p.lose_influence(Some(CardId(9))),
            Err(GameError::InvalidMove)
        );

        let lost = p.lose_influence(Some(CardId(0))).unwrap();
        assert_eq!(lost.role, Role::Duke);
        assert!(p.holds_role(Role::Captain));
    }

    #[test]
    fn losing_the_last_card_is_unconditional() {
        let mut p = player();
        p.gain_influence(card(1, Role::Captain)).unwrap();

        let lost = p.lose_influence(None).unwrap();
        assert_eq!(lost.role, Role::Captain);
        assert!(!p.is_alive());
        assert_eq!(p.lose_influence(None), Err(GameError::AlreadyEliminated));
    }

    #[test]
    fn overspending_fails_without_mutation() {
        let mut p = player();
        assert_eq!(p.spend_coins(3), Err(GameError::InsufficientFunds));
        assert_eq!(p.coins(), 2);

        p.spend_coins(2).unwrap();
        assert_eq!(p.coins(), 0);
    }

    #[test]
    fn lose_coins_clamps() {
        let mut p = player();
        assert_eq!(p.lose_coins(1), 1);
        assert_eq!(p.lose_coins(10), 1);
        assert_eq!(p.coins(), 0);
    }
}
