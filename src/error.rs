use crate::player::PlayerId;

/// Everything that can go wrong inside a match.
///
/// The recoverable variants (`InvalidMove`, `NotYourTurn`, `NotAuthorized`,
/// `AmbiguousChoice`, `WindowClosed`) are reported back through the responder
/// that carried the offending submission and never advance the state machine.
/// The rest indicate either a dead match (`Inactive`) or a logic defect, and
/// abort [`Game::run`](crate::Game::run) with a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("that action is not affordable or not legal right now")]
    InvalidMove,

    #[error("it is not this player's turn")]
    NotYourTurn,

    #[error("this player may not resolve that decision")]
    NotAuthorized,

    #[error("player is already eliminated")]
    AlreadyEliminated,

    #[error("a card must be chosen when two are held")]
    AmbiguousChoice,

    #[error("a hand cannot hold more than two cards")]
    HandOverflow,

    #[error("not enough coins")]
    InsufficientFunds,

    #[error("the draw pile is empty")]
    EmptyDeck,

    #[error("this decision was already resolved or has expired")]
    WindowClosed,

    #[error("the match is no longer active")]
    Inactive,

    #[error("a match takes 2 to 6 players, got {0}")]
    RosterSize(usize),

    #[error("player {0} is not part of this match")]
    UnknownPlayer(PlayerId),

    #[error("engine invariant violated: {0}")]
    InvariantViolation(&'static str),
}
