//! An engine for the bluffing card game Coup: a per-match state machine
//! that suspends at every player decision and resumes on submissions
//! arriving through [`Responder`] handles. Presentation and transport
//! live behind the [`GameInterface`] trait.

pub mod action;
pub mod deck;
pub mod error;
pub mod game;
pub mod interface;
pub mod player;
pub mod role;

pub use action::{Action, ActionKind};
pub use deck::{Card, CardId, Deck};
pub use error::GameError;
pub use game::{Game, GameConfig, MatchHandle, Outcome};
pub use interface::{
    ActionChoice, AutoInterface, BlockResponse, CardChoice, GameEvent, GameInterface,
    PlayerSummary, PublicState, Responder, TargetChoice, TurnResponse,
};
pub use player::{Player, PlayerId};
pub use role::Role;
