use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};

use crate::player::PlayerId;
use crate::role::Role;

/// The seven move kinds. Per-variant behavior (cost, claimed role,
/// targeting, blockability, respondability) lives in the table below so
/// every rule stays exhaustively matched in one place.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Income,
    ForeignAid,
    Tax,
    Coup,
    Exchange,
    Assassinate,
    Steal,
}

pub static ACTION_VARIANTS: [ActionKind; 7] = [
    ActionKind::Income,
    ActionKind::ForeignAid,
    ActionKind::Tax,
    ActionKind::Coup,
    ActionKind::Exchange,
    ActionKind::Assassinate,
    ActionKind::Steal,
];

impl ActionKind {
    /// Coins committed when the action is committed. Not refunded by a
    /// block or a lost challenge.
    pub fn cost(self) -> u8 {
        match self {
            ActionKind::Coup => 7,
            ActionKind::Assassinate => 3,
            _ => 0,
        }
    }

    /// The role this action claims, None for the unclaimed actions.
    pub fn claimed_role(self) -> Option<Role> {
        match self {
            ActionKind::Tax => Some(Role::Duke),
            ActionKind::Exchange => Some(Role::Ambassador),
            ActionKind::Assassinate => Some(Role::Assassin),
            ActionKind::Steal => Some(Role::Captain),
            ActionKind::Income | ActionKind::ForeignAid | ActionKind::Coup => None,
        }
    }

    pub fn has_target(self) -> bool {
        matches!(
            self,
            ActionKind::Coup | ActionKind::Assassinate | ActionKind::Steal
        )
    }

    /// Roles whose claim blocks this action. Targeted actions may only
    /// be blocked by their target; foreign aid by any other player.
    pub fn blocking_roles(self) -> &'static [Role] {
        match self {
            ActionKind::ForeignAid => &[Role::Duke],
            ActionKind::Assassinate => &[Role::Contessa],
            ActionKind::Steal => &[Role::Captain, Role::Ambassador],
            _ => &[],
        }
    }

    pub fn is_blockable(self) -> bool {
        !self.blocking_roles().is_empty()
    }

    /// Whether committing this action opens a response window. True for
    /// anything blockable or claimed; Income and Coup just happen.
    pub fn can_be_responded(self) -> bool {
        self.is_blockable() || self.claimed_role().is_some()
    }

    /// Affordability. Coup additionally becomes mandatory at ten coins,
    /// which the match enforces at selection time.
    pub fn is_valid(self, coins: u8) -> bool {
        coins >= self.cost()
    }
}

impl Debug for ActionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionKind::Income => "Income",
            ActionKind::ForeignAid => "Foreign Aid",
            ActionKind::Tax => "Tax",
            ActionKind::Coup => "Coup",
            ActionKind::Exchange => "Exchange",
            ActionKind::Assassinate => "Assassinate",
            ActionKind::Steal => "Steal",
        };
        f.write_str(name)
    }
}

/// One in-flight action: the kind plus who is doing it to whom and how
/// the table responded. Created at selection, dropped at turn end.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub actor: PlayerId,
    pub target: Option<PlayerId>,
    pub blocked: bool,
    pub blocker: Option<PlayerId>,
    pub blocking_role: Option<Role>,
    pub challenged: bool,
    pub challenger: Option<PlayerId>,
}

impl Action {
    pub fn new(kind: ActionKind, actor: PlayerId) -> Self {
        Self {
            kind,
            actor,
            target: None,
            blocked: false,
            blocker: None,
            blocking_role: None,
            challenged: false,
            challenger: None,
        }
    }
}
