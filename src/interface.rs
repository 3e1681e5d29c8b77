//! The engine's boundary with the presentation/transport adapter.
//!
//! Outbound: [`GameInterface`] prompt and broadcast calls, each prompt
//! carrying a read-only [`PublicState`] projection and a [`Responder`]
//! for the decision it opened. Inbound: [`Responder::submit`], which is
//! how player choices re-enter the suspended match.
//!
//! Every decision point accepts at most one submission: the first valid
//! one closes the window, later ones (and anything arriving after a
//! timeout or abort) get [`GameError::WindowClosed`]. Invalid
//! submissions are acked with the rejecting error and leave the window
//! open, so the offending player can be re-prompted by their transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::action::{Action, ActionKind};
use crate::deck::{Card, CardId};
use crate::error::GameError;
use crate::player::PlayerId;
use crate::role::Role;

/// What everyone at the table is allowed to know. Hand contents never
/// appear here; owner-scoped prompts carry the owner's cards instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicState {
    pub current_player: Option<PlayerId>,
    pub players: Vec<PlayerSummary>,
    pub revealed: Vec<Role>,
    pub deck_size: usize,
    pub active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub coins: u8,
    pub influence: usize,
    pub alive: bool,
}

/// State-change announcements, broadcast to the whole table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GameEvent {
    MatchStarted { players: Vec<PlayerId> },
    TurnStarted { player: PlayerId },
    ActionCommitted { action: Action },
    CoinsChanged { player: PlayerId, coins: u8 },
    BlockClaimed { blocker: PlayerId, role: Role },
    ChallengeRaised { challenger: PlayerId, defender: PlayerId, claimed: Role },
    ClaimProven { claimant: PlayerId, role: Role },
    InfluenceLost { player: PlayerId, role: Role },
    ActionBlocked { action: Action },
    ActionResolved { action: Action },
    PlayerEliminated { player: PlayerId },
    MatchEnded { winner: Option<PlayerId> },
}

/// The current player's pick for this turn.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionChoice {
    pub player: PlayerId,
    pub kind: ActionKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetChoice {
    pub player: PlayerId,
    pub target: PlayerId,
}

/// A table response to a committed action. `Pass` is the explicit
/// decline; the timeout resolves the window the same way.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnResponse {
    Block { player: PlayerId, role: Role },
    Challenge { player: PlayerId },
    Pass { player: PlayerId },
}

/// A table response to a claimed block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockResponse {
    Challenge { player: PlayerId },
    Pass { player: PlayerId },
}

/// Which of their own cards a player gives up (or swaps out, for an
/// exchange).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardChoice {
    pub player: PlayerId,
    pub card: CardId,
}

pub(crate) type Submission<T> = (T, oneshot::Sender<Result<(), GameError>>);

/// Inbound half of one decision point. Cloneable so the adapter can
/// hand it to every eligible responder; the first valid claim wins.
pub struct Responder<T> {
    tx: mpsc::Sender<Submission<T>>,
}

impl<T> Clone for Responder<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send> Responder<T> {
    /// Submit a choice for this decision point.
    ///
    /// `Ok(())` means the choice was accepted and the match resumed.
    /// A recoverable [`GameError`] means it was rejected and the window
    /// is still open. [`GameError::WindowClosed`] means someone else got
    /// there first, or the window timed out or was aborted.
    pub async fn submit(&self, choice: T) -> Result<(), GameError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send((choice, ack_tx))
            .await
            .map_err(|_| GameError::WindowClosed)?;
        ack_rx.await.unwrap_or(Err(GameError::WindowClosed))
    }
}

/// Engine half of a decision point.
pub(crate) struct Window<T> {
    rx: mpsc::Receiver<Submission<T>>,
}

impl<T> Window<T> {
    pub(crate) async fn recv(&mut self) -> Option<Submission<T>> {
        self.rx.recv().await
    }
}

pub(crate) fn decision_point<T>() -> (Responder<T>, Window<T>) {
    let (tx, rx) = mpsc::channel(8);
    (Responder { tx }, Window { rx })
}

/// Presentation adapter contract.
///
/// Prompt calls must return promptly after handing the responder to the
/// transport; the engine suspends on the window itself, not inside the
/// adapter. Different implementations can drive a chat UI, a network
/// protocol, or test fixtures.
#[async_trait]
pub trait GameInterface: Send + Sync {
    /// The current player must pick one of `options`.
    async fn prompt_action(
        &self,
        state: &PublicState,
        player: PlayerId,
        options: &[ActionKind],
        responder: Responder<ActionChoice>,
    );

    /// The actor must pick a target for the committed action kind.
    async fn prompt_target(
        &self,
        state: &PublicState,
        action: &Action,
        options: &[PlayerId],
        responder: Responder<TargetChoice>,
    );

    /// The table may block or challenge the committed action.
    async fn prompt_response(
        &self,
        state: &PublicState,
        action: &Action,
        responder: Responder<TurnResponse>,
    );

    /// The table may challenge the claimed block.
    async fn prompt_block_response(
        &self,
        state: &PublicState,
        action: &Action,
        responder: Responder<BlockResponse>,
    );

    /// `player` must pick one of their own cards. No engine timeout:
    /// this is a terminal, unavoidable choice.
    async fn prompt_card_choice(
        &self,
        player: PlayerId,
        cards: &[Card],
        responder: Responder<CardChoice>,
    );

    async fn broadcast(&self, event: GameEvent);
}

/// Default-choice adapter: takes income when it can, targets the first
/// candidate, never blocks or challenges, discards its first card.
/// Useful for the demo driver, benchmarks, and as a fallback fixture.
pub struct AutoInterface;

#[async_trait]
impl GameInterface for AutoInterface {
    async fn prompt_action(
        &self,
        _state: &PublicState,
        player: PlayerId,
        options: &[ActionKind],
        responder: Responder<ActionChoice>,
    ) {
        let kind = if options.contains(&ActionKind::Income) {
            ActionKind::Income
        } else {
            options[0]
        };
        tokio::spawn(async move {
            let _ = responder.submit(ActionChoice { player, kind }).await;
        });
    }

    async fn prompt_target(
        &self,
        _state: &PublicState,
        action: &Action,
        options: &[PlayerId],
        responder: Responder<TargetChoice>,
    ) {
        let choice = TargetChoice {
            player: action.actor,
            target: options[0],
        };
        tokio::spawn(async move {
            let _ = responder.submit(choice).await;
        });
    }

    async fn prompt_response(
        &self,
        _state: &PublicState,
        _action: &Action,
        _responder: Responder<TurnResponse>,
    ) {
        // decline by timeout
    }

    async fn prompt_block_response(
        &self,
        _state: &PublicState,
        _action: &Action,
        _responder: Responder<BlockResponse>,
    ) {
        // decline by timeout
    }

    async fn prompt_card_choice(
        &self,
        player: PlayerId,
        cards: &[Card],
        responder: Responder<CardChoice>,
    ) {
        let choice = CardChoice {
            player,
            card: cards[0].id,
        };
        tokio::spawn(async move {
            let _ = responder.submit(choice).await;
        });
    }

    async fn broadcast(&self, _event: GameEvent) {}
}
