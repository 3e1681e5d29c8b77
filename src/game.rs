use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::action::{Action, ActionKind, ACTION_VARIANTS};
use crate::deck::{Card, Deck};
use crate::error::GameError;
use crate::interface::{
    decision_point, ActionChoice, BlockResponse, CardChoice, GameEvent, GameInterface,
    PlayerSummary, PublicState, TargetChoice, TurnResponse, Window,
};
use crate::player::{Player, PlayerId};
use crate::role::Role;

#[derive(Clone, Debug)]
pub struct GameConfig {
    /// How long block/challenge windows stay open before resolving to
    /// the nobody-responded branch.
    pub response_timeout: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(10),
        }
    }
}

/// How a finished match came out. `winner` is None when the match was
/// aborted externally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub winner: Option<PlayerId>,
    pub turns: usize,
}

/// External cancellation for a running match. Aborting resolves any
/// outstanding decision window so the suspended turn loop can observe
/// the inactive flag and exit.
#[derive(Clone)]
pub struct MatchHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl MatchHandle {
    pub fn abort(&self) {
        let _ = self.cancel.send(true);
    }
}

/// Outcome of one turn-response window.
enum TableResponse {
    Quiet,
    Blocked { blocker: PlayerId, role: Role },
    Challenged { challenger: PlayerId },
}

/// One match: the roster, turn order, deck, and the single in-flight
/// action. `run` drives the whole game as one logical task; separate
/// matches share nothing and may run concurrently.
pub struct Game {
    players: Vec<Player>,
    // alive players awaiting their turn; never contains the current player
    turn_order: VecDeque<usize>,
    current: Option<usize>,
    dead: Vec<usize>,
    deck: Deck,
    action: Option<Action>,
    // who a pending card-choice prompt is addressed to
    choosing: Option<PlayerId>,
    active: bool,
    turn: usize,
    winner: Option<usize>,
    rng: Pcg64,
    config: GameConfig,
    interface: Arc<dyn GameInterface>,
    handle: MatchHandle,
    cancel: watch::Receiver<bool>,
}

impl Game {
    pub fn new(
        roster: Vec<(PlayerId, String)>,
        interface: Arc<dyn GameInterface>,
        config: GameConfig,
    ) -> Result<Self, GameError> {
        Self::with_rng(roster, interface, config, Pcg64::from_entropy())
    }

    /// Deal a match from a caller-supplied RNG so deck order and seating
    /// are reproducible.
    pub fn with_rng(
        roster: Vec<(PlayerId, String)>,
        interface: Arc<dyn GameInterface>,
        config: GameConfig,
        mut rng: Pcg64,
    ) -> Result<Self, GameError> {
        if !(2..=6).contains(&roster.len()) {
            return Err(GameError::RosterSize(roster.len()));
        }

        let mut deck = Deck::new(&mut rng);
        let mut players: Vec<Player> = roster
            .into_iter()
            .map(|(id, name)| Player::new(id, name))
            .collect();
        for player in &mut players {
            player.gain_influence(deck.draw()?)?;
            player.gain_influence(deck.draw()?)?;
        }

        // randomized seating
        let mut order: Vec<usize> = (0..players.len()).collect();
        order.shuffle(&mut rng);
        let mut turn_order: VecDeque<usize> = order.into();
        let current = turn_order.pop_front();

        let (cancel_tx, cancel_rx) = watch::channel(false);

        Ok(Self {
            players,
            turn_order,
            current,
            dead: Vec::new(),
            deck,
            action: None,
            choosing: None,
            active: true,
            turn: 0,
            winner: None,
            rng,
            config,
            interface,
            handle: MatchHandle {
                cancel: Arc::new(cancel_tx),
            },
            cancel: cancel_rx,
        })
    }

    pub fn handle(&self) -> MatchHandle {
        self.handle.clone()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn current_player(&self) -> Option<PlayerId> {
        self.current.map(|idx| self.players[idx].id)
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner.map(|idx| self.players[idx].id)
    }

    /// Players knocked out so far, in elimination order.
    pub fn eliminated(&self) -> Vec<PlayerId> {
        self.dead.iter().map(|&idx| self.players[idx].id).collect()
    }

    /// The table-visible projection handed to every prompt. Hand
    /// contents never leave the engine through here.
    pub fn public_state(&self) -> PublicState {
        PublicState {
            current_player: self.current_player(),
            players: self
                .players
                .iter()
                .map(|p| PlayerSummary {
                    id: p.id,
                    name: p.name.clone(),
                    coins: p.coins(),
                    influence: p.influence(),
                    alive: p.is_alive(),
                })
                .collect(),
            revealed: self.deck.revealed().iter().map(|c| c.role).collect(),
            deck_size: self.deck.size(),
            active: self.active,
        }
    }

    /// Drive the match to its end: a single surviving player, or an
    /// external abort. Errors mean a broken invariant, not a lost game.
    pub async fn run(&mut self) -> Result<Outcome, GameError> {
        self.broadcast(GameEvent::MatchStarted {
            players: self.players.iter().map(|p| p.id).collect(),
        })
        .await;

        while self.active {
            match self.take_turn().await {
                Ok(()) => {}
                Err(GameError::Inactive) => {
                    self.finish(None).await;
                    break;
                }
                Err(err) => {
                    tracing::error!(turn = self.turn, %err, "aborting match");
                    return Err(err);
                }
            }
            self.action = None;
            debug_assert_eq!(self.census(), 15);
            if self.active {
                self.advance_turn().await;
            }
        }

        Ok(Outcome {
            winner: self.winner(),
            turns: self.turn,
        })
    }

    async fn take_turn(&mut self) -> Result<(), GameError> {
        let cur = self
            .current
            .ok_or(GameError::InvariantViolation("no current player at turn start"))?;
        self.turn += 1;
        let actor_id = self.players[cur].id;
        tracing::info!(turn = self.turn, player = %actor_id, "turn started");
        self.broadcast(GameEvent::TurnStarted { player: actor_id }).await;

        // Ten coins or more force a coup; selection is skipped entirely.
        let kind = if self.players[cur].coins() >= 10 {
            ActionKind::Coup
        } else {
            let options = self.legal_actions(cur);
            let (responder, mut window) = decision_point();
            self.interface
                .prompt_action(&self.public_state(), actor_id, &options, responder)
                .await;
            self.await_choice(&mut window, Self::validate_action_choice)
                .await?
                .kind
        };

        let mut action = Action::new(kind, actor_id);
        if kind.has_target() {
            let options = self.target_candidates(cur);
            let (responder, mut window) = decision_point();
            self.interface
                .prompt_target(&self.public_state(), &action, &options, responder)
                .await;
            let choice = self
                .await_choice(&mut window, Self::validate_target_choice)
                .await?;
            action.target = Some(choice.target);
        }

        // The cost is committed here, before anyone may respond; a block
        // or a lost challenge does not refund it.
        if kind.cost() > 0 {
            self.players[cur].spend_coins(kind.cost())?;
            self.announce_coins(cur).await;
        }
        tracing::debug!(?kind, target = ?action.target, "action committed");
        self.action = Some(action.clone());
        self.broadcast(GameEvent::ActionCommitted { action }).await;

        if !kind.can_be_responded() {
            return self.execute_action().await;
        }

        let deadline = Instant::now() + self.config.response_timeout;
        let (responder, window) = decision_point();
        let action = self.current_action()?.clone();
        self.interface
            .prompt_response(&self.public_state(), &action, responder)
            .await;
        match self.await_turn_response(window, deadline).await? {
            TableResponse::Quiet => self.execute_action().await,
            TableResponse::Challenged { challenger } => {
                self.resolve_action_challenge(challenger).await
            }
            TableResponse::Blocked { blocker, role } => {
                if let Some(action) = self.action.as_mut() {
                    action.blocked = true;
                    action.blocker = Some(blocker);
                    action.blocking_role = Some(role);
                }
                self.broadcast(GameEvent::BlockClaimed { blocker, role }).await;

                let deadline = Instant::now() + self.config.response_timeout;
                let (responder, window) = decision_point();
                let action = self.current_action()?.clone();
                self.interface
                    .prompt_block_response(&self.public_state(), &action, responder)
                    .await;
                match self.await_block_response(window, deadline, blocker).await? {
                    None => self.on_block().await,
                    Some(challenger) => self.resolve_block_challenge(challenger).await,
                }
            }
        }
    }

    /// Challenge against the actor's claimed role.
    async fn resolve_action_challenge(&mut self, challenger: PlayerId) -> Result<(), GameError> {
        let action = self.current_action()?.clone();
        if let Some(a) = self.action.as_mut() {
            a.challenged = true;
            a.challenger = Some(challenger);
        }
        let claimed = action
            .kind
            .claimed_role()
            .ok_or(GameError::InvariantViolation("challenge against an unclaimed action"))?;
        tracing::info!(%challenger, defender = %action.actor, role = %claimed, "action challenged");
        self.broadcast(GameEvent::ChallengeRaised {
            challenger,
            defender: action.actor,
            claimed,
        })
        .await;

        let actor_idx = self.player_index(action.actor)?;
        let challenger_idx = self.player_index(challenger)?;

        if let Some(card) = self.players[actor_idx].take_role(claimed) {
            // truthful claim: the proven card goes back face-down and a
            // replacement is drawn
            self.deck.return_to_deck(card, &mut self.rng);
            let drawn = self.deck.draw()?;
            self.players[actor_idx].gain_influence(drawn)?;
            self.broadcast(GameEvent::ClaimProven {
                claimant: action.actor,
                role: claimed,
            })
            .await;
            self.lose_influence(challenger_idx).await?;
            self.execute_action().await
        } else {
            // caught bluffing: the action never takes effect
            self.lose_influence(actor_idx).await?;
            Ok(())
        }
    }

    /// Challenge against the blocker's claimed blocking role.
    async fn resolve_block_challenge(&mut self, challenger: PlayerId) -> Result<(), GameError> {
        let action = self.current_action()?.clone();
        if let Some(a) = self.action.as_mut() {
            a.challenged = true;
            a.challenger = Some(challenger);
        }
        let blocker = action
            .blocker
            .ok_or(GameError::InvariantViolation("block challenge without a blocker"))?;
        let role = action
            .blocking_role
            .ok_or(GameError::InvariantViolation("block challenge without a claimed role"))?;
        tracing::info!(%challenger, defender = %blocker, role = %role, "block challenged");
        self.broadcast(GameEvent::ChallengeRaised {
            challenger,
            defender: blocker,
            claimed: role,
        })
        .await;

        let blocker_idx = self.player_index(blocker)?;
        let challenger_idx = self.player_index(challenger)?;

        if let Some(card) = self.players[blocker_idx].take_role(role) {
            self.deck.return_to_deck(card, &mut self.rng);
            let drawn = self.deck.draw()?;
            self.players[blocker_idx].gain_influence(drawn)?;
            self.broadcast(GameEvent::ClaimProven {
                claimant: blocker,
                role,
            })
            .await;
            self.lose_influence(challenger_idx).await?;
            self.on_block().await
        } else {
            // the block was a bluff, the original action goes through
            self.lose_influence(blocker_idx).await?;
            self.execute_action().await
        }
    }

    /// Apply the committed action's effect.
    async fn execute_action(&mut self) -> Result<(), GameError> {
        let action = self.current_action()?.clone();
        let actor = self.player_index(action.actor)?;

        match action.kind {
            ActionKind::Income => {
                self.players[actor].gain_coins(1);
                self.announce_coins(actor).await;
            }
            ActionKind::ForeignAid => {
                self.players[actor].gain_coins(2);
                self.announce_coins(actor).await;
            }
            ActionKind::Tax => {
                self.players[actor].gain_coins(3);
                self.announce_coins(actor).await;
            }
            ActionKind::Coup | ActionKind::Assassinate => {
                let target = self.target_index(&action)?;
                // the target may already have died resolving a challenge
                if self.players[target].is_alive() {
                    self.lose_influence(target).await?;
                }
            }
            ActionKind::Steal => {
                let target = self.target_index(&action)?;
                if self.players[target].is_alive() {
                    let taken = self.players[target].lose_coins(2);
                    self.players[actor].gain_coins(taken);
                    self.announce_coins(target).await;
                    self.announce_coins(actor).await;
                }
            }
            ActionKind::Exchange => {
                // swap one card face-down; hand size is preserved
                let card = if self.players[actor].influence() >= 2 {
                    let id = self.prompt_card(actor).await?;
                    self.players[actor].lose_influence(Some(id))?
                } else {
                    self.players[actor].lose_influence(None)?
                };
                self.deck.return_to_deck(card, &mut self.rng);
                let drawn = self.deck.draw()?;
                self.players[actor].gain_influence(drawn)?;
            }
        }

        self.broadcast(GameEvent::ActionResolved { action }).await;
        Ok(())
    }

    /// A blocked action simply ends the turn. Costs were committed at
    /// selection, so a blocked assassination still ran the actor three
    /// coins.
    async fn on_block(&mut self) -> Result<(), GameError> {
        let action = self.current_action()?.clone();
        tracing::info!(kind = ?action.kind, blocker = ?action.blocker, "action blocked");
        self.broadcast(GameEvent::ActionBlocked { action }).await;
        Ok(())
    }

    /// The lose-influence protocol: owner picks the card when two are
    /// held (no engine timeout), the lost card goes to the public pile,
    /// then the alive-check runs.
    async fn lose_influence(&mut self, idx: usize) -> Result<(), GameError> {
        let card = if self.players[idx].influence() >= 2 {
            let id = self.prompt_card(idx).await?;
            self.players[idx].lose_influence(Some(id))?
        } else {
            self.players[idx].lose_influence(None)?
        };
        self.deck.return_revealed(card);
        let player = self.players[idx].id;
        tracing::info!(%player, role = %card.role, "influence lost");
        self.broadcast(GameEvent::InfluenceLost {
            player,
            role: card.role,
        })
        .await;
        self.check_alive(idx).await;
        Ok(())
    }

    /// Remove an empty-handed player from the turn rotation.
    async fn check_alive(&mut self, idx: usize) {
        if self.players[idx].is_alive() {
            return;
        }
        if self.current == Some(idx) {
            self.current = None;
        } else {
            self.turn_order.retain(|&i| i != idx);
        }
        self.dead.push(idx);
        let player = self.players[idx].id;
        tracing::info!(%player, "player eliminated");
        self.broadcast(GameEvent::PlayerEliminated { player }).await;
    }

    async fn advance_turn(&mut self) {
        if self.turn_order.is_empty() {
            let winner = self.current.filter(|&idx| self.players[idx].is_alive());
            self.finish(winner).await;
            return;
        }
        if let Some(cur) = self.current {
            if self.players[cur].is_alive() {
                self.turn_order.push_back(cur);
            }
        }
        self.current = self.turn_order.pop_front();
    }

    async fn finish(&mut self, winner: Option<usize>) {
        self.active = false;
        self.winner = winner;
        let winner = self.winner();
        tracing::info!(?winner, "match ended");
        self.broadcast(GameEvent::MatchEnded { winner }).await;
    }

    // -----------------------
    // Decision windows
    // -----------------------

    /// Await an untimed decision (action, target, card choice). Invalid
    /// submissions are acked with their error and the window stays open;
    /// the first valid one resolves it.
    async fn await_choice<T: Send>(
        &mut self,
        window: &mut Window<T>,
        validate: fn(&Self, &T) -> Result<(), GameError>,
    ) -> Result<T, GameError> {
        loop {
            let received = tokio::select! {
                _ = self.cancel.changed() => return Err(GameError::Inactive),
                received = window.recv() => received,
            };
            let Some((choice, ack)) = received else {
                // the channel may close on abort before the cancel
                // branch gets polled
                if *self.cancel.borrow() {
                    return Err(GameError::Inactive);
                }
                // every responder was dropped without resolving; this
                // decision can never be made
                return Err(GameError::InvariantViolation(
                    "decision point abandoned by the adapter",
                ));
            };
            match validate(self, &choice) {
                Ok(()) => {
                    let _ = ack.send(Ok(()));
                    return Ok(choice);
                }
                Err(err) => {
                    let _ = ack.send(Err(err));
                }
            }
        }
    }

    async fn await_turn_response(
        &mut self,
        mut window: Window<TurnResponse>,
        deadline: Instant,
    ) -> Result<TableResponse, GameError> {
        let eligible = self.response_eligible();
        let mut passed: HashSet<PlayerId> = HashSet::new();
        loop {
            let received = tokio::select! {
                _ = self.cancel.changed() => return Err(GameError::Inactive),
                received = window.recv() => received,
                _ = tokio::time::sleep_until(deadline) => return Ok(TableResponse::Quiet),
            };
            let Some((choice, ack)) = received else {
                if *self.cancel.borrow() {
                    return Err(GameError::Inactive);
                }
                // nobody holds a responder anymore; same as silence
                return Ok(TableResponse::Quiet);
            };
            match self.validate_turn_response(&choice, &eligible) {
                Err(err) => {
                    let _ = ack.send(Err(err));
                }
                Ok(()) => {
                    let _ = ack.send(Ok(()));
                    match choice {
                        TurnResponse::Pass { player } => {
                            passed.insert(player);
                            if passed.len() == eligible.len() {
                                return Ok(TableResponse::Quiet);
                            }
                        }
                        TurnResponse::Block { player, role } => {
                            return Ok(TableResponse::Blocked {
                                blocker: player,
                                role,
                            });
                        }
                        TurnResponse::Challenge { player } => {
                            return Ok(TableResponse::Challenged { challenger: player });
                        }
                    }
                }
            }
        }
    }

    /// Returns the challenger, or None when the block stands.
    async fn await_block_response(
        &mut self,
        mut window: Window<BlockResponse>,
        deadline: Instant,
        blocker: PlayerId,
    ) -> Result<Option<PlayerId>, GameError> {
        let eligible: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| p.is_alive() && p.id != blocker)
            .map(|p| p.id)
            .collect();
        let mut passed: HashSet<PlayerId> = HashSet::new();
        loop {
            let received = tokio::select! {
                _ = self.cancel.changed() => return Err(GameError::Inactive),
                received = window.recv() => received,
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            };
            let Some((choice, ack)) = received else {
                if *self.cancel.borrow() {
                    return Err(GameError::Inactive);
                }
                return Ok(None);
            };
            let player = match choice {
                BlockResponse::Challenge { player } | BlockResponse::Pass { player } => player,
            };
            if !eligible.contains(&player) {
                let _ = ack.send(Err(GameError::NotAuthorized));
                continue;
            }
            let _ = ack.send(Ok(()));
            match choice {
                BlockResponse::Challenge { player } => return Ok(Some(player)),
                BlockResponse::Pass { player } => {
                    passed.insert(player);
                    if passed.len() == eligible.len() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn prompt_card(&mut self, idx: usize) -> Result<crate::deck::CardId, GameError> {
        let player = self.players[idx].id;
        let cards: Vec<Card> = self.players[idx].hand().to_vec();
        self.choosing = Some(player);
        let (responder, mut window) = decision_point();
        self.interface
            .prompt_card_choice(player, &cards, responder)
            .await;
        let choice = self
            .await_choice(&mut window, Self::validate_card_choice)
            .await?;
        self.choosing = None;
        Ok(choice.card)
    }

    // -----------------------
    // Validation
    // -----------------------

    fn validate_action_choice(game: &Game, choice: &ActionChoice) -> Result<(), GameError> {
        let cur = game.current.ok_or(GameError::NotYourTurn)?;
        let player = &game.players[cur];
        if choice.player != player.id {
            return Err(GameError::NotYourTurn);
        }
        if !choice.kind.is_valid(player.coins()) {
            return Err(GameError::InvalidMove);
        }
        // inbound safety: the forced-coup turn never opens this window
        if player.coins() >= 10 && choice.kind != ActionKind::Coup {
            return Err(GameError::InvalidMove);
        }
        Ok(())
    }

    fn validate_target_choice(game: &Game, choice: &TargetChoice) -> Result<(), GameError> {
        let cur = game.current.ok_or(GameError::NotYourTurn)?;
        if choice.player != game.players[cur].id {
            return Err(GameError::NotAuthorized);
        }
        if choice.target == choice.player {
            return Err(GameError::InvalidMove);
        }
        let target = game.player_index(choice.target)?;
        // dead players are never a valid choice
        if !game.players[target].is_alive() {
            return Err(GameError::InvalidMove);
        }
        Ok(())
    }

    fn validate_card_choice(game: &Game, choice: &CardChoice) -> Result<(), GameError> {
        if game.choosing != Some(choice.player) {
            return Err(GameError::NotAuthorized);
        }
        let idx = game.player_index(choice.player)?;
        if !game.players[idx].hand().iter().any(|c| c.id == choice.card) {
            return Err(GameError::InvalidMove);
        }
        Ok(())
    }

    fn validate_turn_response(
        &self,
        choice: &TurnResponse,
        eligible: &[PlayerId],
    ) -> Result<(), GameError> {
        let player = match choice {
            TurnResponse::Block { player, .. }
            | TurnResponse::Challenge { player }
            | TurnResponse::Pass { player } => *player,
        };
        if !eligible.contains(&player) {
            return Err(GameError::NotAuthorized);
        }
        let action = self
            .action
            .as_ref()
            .ok_or(GameError::InvariantViolation("no action in flight"))?;
        match choice {
            TurnResponse::Pass { .. } => Ok(()),
            TurnResponse::Challenge { .. } => {
                if action.kind.claimed_role().is_some() {
                    Ok(())
                } else {
                    Err(GameError::InvalidMove)
                }
            }
            TurnResponse::Block { role, .. } => {
                if !role.blocks(action.kind) {
                    return Err(GameError::InvalidMove);
                }
                // targeted actions may only be blocked by their target
                if let Some(target) = action.target {
                    if player != target {
                        return Err(GameError::NotAuthorized);
                    }
                }
                Ok(())
            }
        }
    }

    // -----------------------
    // Helpers
    // -----------------------

    fn legal_actions(&self, idx: usize) -> Vec<ActionKind> {
        let coins = self.players[idx].coins();
        ACTION_VARIANTS
            .iter()
            .copied()
            .filter(|kind| kind.is_valid(coins))
            .collect()
    }

    fn target_candidates(&self, idx: usize) -> Vec<PlayerId> {
        self.players
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != idx && p.is_alive())
            .map(|(_, p)| p.id)
            .collect()
    }

    fn response_eligible(&self) -> Vec<PlayerId> {
        let actor = self.action.as_ref().map(|a| a.actor);
        self.players
            .iter()
            .filter(|p| p.is_alive() && Some(p.id) != actor)
            .map(|p| p.id)
            .collect()
    }

    fn current_action(&self) -> Result<&Action, GameError> {
        self.action
            .as_ref()
            .ok_or(GameError::InvariantViolation("no action in flight"))
    }

    fn player_index(&self, id: PlayerId) -> Result<usize, GameError> {
        self.players
            .iter()
            .position(|p| p.id == id)
            .ok_or(GameError::UnknownPlayer(id))
    }

    fn target_index(&self, action: &Action) -> Result<usize, GameError> {
        let target = action
            .target
            .ok_or(GameError::InvariantViolation("targeted action without a target"))?;
        self.player_index(target)
    }

    async fn announce_coins(&self, idx: usize) {
        self.broadcast(GameEvent::CoinsChanged {
            player: self.players[idx].id,
            coins: self.players[idx].coins(),
        })
        .await;
    }

    async fn broadcast(&self, event: GameEvent) {
        self.interface.broadcast(event).await;
    }

    /// Census over the whole card universe; 15 in every reachable state.
    pub(crate) fn census(&self) -> usize {
        self.deck.census() + self.players.iter().map(|p| p.influence()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::interface::{AutoInterface, Responder};

    /// Queued choices for a whole match, consumed one entry (or one
    /// batch, for response windows) per prompt. An exhausted action
    /// queue aborts the match so `run` returns and state can be
    /// inspected; an absent response batch parks the responder, which
    /// leaves the window to its timeout.
    #[derive(Default)]
    struct Script {
        actions: Mutex<VecDeque<ActionChoice>>,
        targets: Mutex<VecDeque<TargetChoice>>,
        responses: Mutex<VecDeque<Vec<TurnResponse>>>,
        block_responses: Mutex<VecDeque<Vec<BlockResponse>>>,
        cards: Mutex<VecDeque<usize>>,
        events: Mutex<Vec<GameEvent>>,
        handle: Mutex<Option<MatchHandle>>,
        parked: Mutex<Vec<Responder<TurnResponse>>>,
    }

    #[derive(Clone, Default)]
    struct ScriptedInterface {
        script: Arc<Script>,
    }

    impl ScriptedInterface {
        fn push_action(&self, player: u64, kind: ActionKind) {
            self.script.actions.lock().unwrap().push_back(ActionChoice {
                player: PlayerId(player),
                kind,
            });
        }

        fn push_target(&self, player: u64, target: u64) {
            self.script.targets.lock().unwrap().push_back(TargetChoice {
                player: PlayerId(player),
                target: PlayerId(target),
            });
        }

        fn push_responses(&self, batch: Vec<TurnResponse>) {
            self.script.responses.lock().unwrap().push_back(batch);
        }

        fn push_block_responses(&self, batch: Vec<BlockResponse>) {
            self.script.block_responses.lock().unwrap().push_back(batch);
        }

        fn push_card(&self, index: usize) {
            self.script.cards.lock().unwrap().push_back(index);
        }

        fn events(&self) -> Vec<GameEvent> {
            self.script.events.lock().unwrap().clone()
        }

        fn abort_match(&self) {
            if let Some(handle) = self.script.handle.lock().unwrap().clone() {
                handle.abort();
            }
        }
    }

    #[async_trait]
    impl GameInterface for ScriptedInterface {
        async fn prompt_action(
            &self,
            _state: &PublicState,
            _player: PlayerId,
            _options: &[ActionKind],
            responder: Responder<ActionChoice>,
        ) {
            let this = self.clone();
            tokio::spawn(async move {
                loop {
                    let next = this.script.actions.lock().unwrap().pop_front();
                    let Some(choice) = next else {
                        this.abort_match();
                        return;
                    };
                    match responder.submit(choice).await {
                        // rejected entries fall through to the next one
                        Err(err) if err != GameError::WindowClosed => continue,
                        _ => return,
                    }
                }
            });
        }

        async fn prompt_target(
            &self,
            _state: &PublicState,
            _action: &Action,
            _options: &[PlayerId],
            responder: Responder<TargetChoice>,
        ) {
            let this = self.clone();
            tokio::spawn(async move {
                loop {
                    let next = this.script.targets.lock().unwrap().pop_front();
                    let Some(choice) = next else {
                        this.abort_match();
                        return;
                    };
                    match responder.submit(choice).await {
                        Err(err) if err != GameError::WindowClosed => continue,
                        _ => return,
                    }
                }
            });
        }

        async fn prompt_response(
            &self,
            _state: &PublicState,
            _action: &Action,
            responder: Responder<TurnResponse>,
        ) {
            let batch = self.script.responses.lock().unwrap().pop_front();
            let Some(batch) = batch else {
                self.script.parked.lock().unwrap().push(responder);
                return;
            };
            tokio::spawn(async move {
                for choice in batch {
                    if let Err(GameError::WindowClosed) = responder.submit(choice).await {
                        break;
                    }
                }
            });
        }

        async fn prompt_block_response(
            &self,
            _state: &PublicState,
            _action: &Action,
            responder: Responder<BlockResponse>,
        ) {
            let batch = self.script.block_responses.lock().unwrap().pop_front();
            let Some(batch) = batch else {
                return;
            };
            tokio::spawn(async move {
                for choice in batch {
                    if let Err(GameError::WindowClosed) = responder.submit(choice).await {
                        break;
                    }
                }
            });
        }

        async fn prompt_card_choice(
            &self,
            player: PlayerId,
            cards: &[Card],
            responder: Responder<CardChoice>,
        ) {
            let index = self.script.cards.lock().unwrap().pop_front().unwrap_or(0);
            let choice = CardChoice {
                player,
                card: cards[index % cards.len()].id,
            };
            tokio::spawn(async move {
                let _ = responder.submit(choice).await;
            });
        }

        async fn broadcast(&self, event: GameEvent) {
            self.script.events.lock().unwrap().push(event);
        }
    }

    /// Fixed seating (player 1 goes first) so assertions stay stable.
    fn scripted_game(players: u64, seed: u64, script: &ScriptedInterface) -> Game {
        let roster = (1..=players)
            .map(|n| (PlayerId(n), format!("Player {n}")))
            .collect();
        let mut game = Game::with_rng(
            roster,
            Arc::new(script.clone()),
            GameConfig::default(),
            Pcg64::seed_from_u64(seed),
        )
        .unwrap();
        *script.script.handle.lock().unwrap() = Some(game.handle());
        game.current = Some(0);
        game.turn_order = (1..players as usize).collect();
        game
    }

    /// Swap every listed player's dealt hand for specific roles while
    /// keeping the card census intact.
    fn rig_hands(game: &mut Game, hands: &[[Role; 2]]) {
        for idx in 0..hands.len() {
            let old: Vec<Card> = game.players[idx].hand.drain(..).collect();
            for card in old {
                game.deck.return_to_deck(card, &mut game.rng);
            }
        }
        for (idx, roles) in hands.iter().enumerate() {
            for &role in roles {
                let card = game
                    .deck
                    .remove_role(role)
                    .expect("role available after draining the rigged hands");
                game.players[idx].hand.push(card);
            }
        }
    }

    fn turn_owners(events: &[GameEvent]) -> Vec<PlayerId> {
        events
            .iter()
            .filter_map(|e| match e {
                GameEvent::TurnStarted { player } => Some(*player),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn roster_size_is_enforced() {
        let solo = vec![(PlayerId(1), "Solo".to_string())];
        let game = Game::new(solo, Arc::new(AutoInterface), GameConfig::default());
        assert!(matches!(game, Err(GameError::RosterSize(1))));

        let crowd: Vec<_> = (1..=7)
            .map(|n| (PlayerId(n), format!("Player {n}")))
            .collect();
        let game = Game::new(crowd, Arc::new(AutoInterface), GameConfig::default());
        assert!(matches!(game, Err(GameError::RosterSize(7))));
    }

    #[tokio::test(start_paused = true)]
    async fn income_adds_a_coin_and_the_turn_rotates() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Income);
        script.push_action(2, ActionKind::Income);
        let mut game = scripted_game(2, 3, &script);

        let outcome = game.run().await.unwrap();

        assert_eq!(outcome.winner, None);
        assert_eq!(game.players()[0].coins(), 3);
        assert_eq!(game.players()[1].coins(), 3);
        assert_eq!(
            turn_owners(&script.events()),
            vec![PlayerId(1), PlayerId(2), PlayerId(1)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_turn_submission_is_rejected() {
        let script = ScriptedInterface::default();
        script.push_action(2, ActionKind::Income);
        script.push_action(1, ActionKind::Income);
        let mut game = scripted_game(2, 4, &script);

        game.run().await.unwrap();

        // the out-of-turn entry bounced, the in-turn one played
        assert_eq!(game.players()[0].coins(), 3);
        assert_eq!(game.players()[1].coins(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_aid_can_be_blocked_by_anyone_claiming_duke() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::ForeignAid);
        script.push_responses(vec![TurnResponse::Block {
            player: PlayerId(2),
            role: Role::Duke,
        }]);
        let mut game = scripted_game(2, 5, &script);

        game.run().await.unwrap();

        assert_eq!(game.players()[0].coins(), 2);
        // an unchallenged claim is never verified
        assert_eq!(game.players()[1].influence(), 2);
        assert!(script
            .events()
            .iter()
            .any(|e| matches!(e, GameEvent::ActionBlocked { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_aid_cannot_be_challenged() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::ForeignAid);
        script.push_responses(vec![TurnResponse::Challenge {
            player: PlayerId(2),
        }]);
        let mut game = scripted_game(2, 6, &script);

        game.run().await.unwrap();

        // the challenge bounced and the window lapsed
        assert_eq!(game.players()[0].coins(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_tax_resolves_on_timeout() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Tax);
        let mut game = scripted_game(2, 7, &script);

        game.run().await.unwrap();

        assert_eq!(game.players()[0].coins(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_gets_window_closed() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Tax);
        let mut game = scripted_game(2, 7, &script);
        game.run().await.unwrap();

        let parked = script.script.parked.lock().unwrap().pop().unwrap();
        assert_eq!(
            parked
                .submit(TurnResponse::Challenge {
                    player: PlayerId(2)
                })
                .await,
            Err(GameError::WindowClosed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn everyone_passing_resolves_the_action_early() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Tax);
        script.push_responses(vec![
            TurnResponse::Pass {
                player: PlayerId(2),
            },
            TurnResponse::Pass {
                player: PlayerId(3),
            },
        ]);
        let mut game = scripted_game(3, 8, &script);

        game.run().await.unwrap();

        assert_eq!(game.players()[0].coins(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn truthful_claim_survives_a_challenge() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Tax);
        script.push_responses(vec![TurnResponse::Challenge {
            player: PlayerId(2),
        }]);
        script.push_card(0); // the challenger picks what to give up
        let mut game = scripted_game(2, 9, &script);
        rig_hands(
            &mut game,
            &[[Role::Duke, Role::Assassin], [Role::Captain, Role::Contessa]],
        );

        game.run().await.unwrap();

        // tax resolved, the challenger paid, the proven card was swapped
        assert_eq!(game.players()[0].coins(), 5);
        assert_eq!(game.players()[0].influence(), 2);
        assert_eq!(game.players()[1].influence(), 1);
        assert_eq!(game.deck().revealed().len(), 1);
        assert_eq!(game.census(), 15);
        assert!(script.events().iter().any(|e| matches!(
            e,
            GameEvent::ClaimProven {
                claimant: PlayerId(1),
                role: Role::Duke,
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn bluff_caught_by_a_challenge_cancels_the_action() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Tax);
        script.push_responses(vec![TurnResponse::Challenge {
            player: PlayerId(2),
        }]);
        script.push_card(0); // the bluffer picks what to give up
        let mut game = scripted_game(2, 10, &script);
        rig_hands(
            &mut game,
            &[
                [Role::Captain, Role::Contessa],
                [Role::Captain, Role::Contessa],
            ],
        );

        game.run().await.unwrap();

        assert_eq!(game.players()[0].coins(), 2);
        assert_eq!(game.players()[0].influence(), 1);
        assert_eq!(game.players()[1].influence(), 2);
        assert_eq!(game.deck().revealed()[0].role, Role::Captain);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_assassination_keeps_the_fee() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Assassinate);
        script.push_target(1, 2);
        script.push_responses(vec![TurnResponse::Block {
            player: PlayerId(2),
            role: Role::Contessa,
        }]);
        let mut game = scripted_game(2, 11, &script);
        game.players[0].coins = 3;

        game.run().await.unwrap();

        // the three coins stay spent even though nobody died
        assert_eq!(game.players()[0].coins(), 0);
        assert_eq!(game.players()[1].influence(), 2);
        assert!(script
            .events()
            .iter()
            .any(|e| matches!(e, GameEvent::ActionBlocked { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_target_may_block_a_targeted_action() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Steal);
        script.push_target(1, 2);
        script.push_responses(vec![
            TurnResponse::Block {
                player: PlayerId(3),
                role: Role::Captain,
            },
            TurnResponse::Block {
                player: PlayerId(2),
                role: Role::Captain,
            },
        ]);
        let mut game = scripted_game(3, 12, &script);

        game.run().await.unwrap();

        // the bystander's block bounced, the target's stood
        assert_eq!(game.players()[0].coins(), 2);
        assert_eq!(game.players()[1].coins(), 2);
        assert!(script
            .events()
            .iter()
            .any(|e| matches!(e, GameEvent::ActionBlocked { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_block_challenge_lets_the_action_through() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Steal);
        script.push_target(1, 2);
        script.push_responses(vec![TurnResponse::Block {
            player: PlayerId(2),
            role: Role::Ambassador,
        }]);
        script.push_block_responses(vec![BlockResponse::Challenge {
            player: PlayerId(1),
        }]);
        script.push_card(0); // the caught blocker picks what to give up
        let mut game = scripted_game(2, 13, &script);
        rig_hands(
            &mut game,
            &[[Role::Captain, Role::Contessa], [Role::Duke, Role::Duke]],
        );

        game.run().await.unwrap();

        // the bluffed block collapsed and the steal resolved
        assert_eq!(game.players()[1].influence(), 1);
        assert_eq!(game.players()[1].coins(), 0);
        assert_eq!(game.players()[0].coins(), 4);
        assert_eq!(game.deck().revealed()[0].role, Role::Duke);
    }

    #[tokio::test(start_paused = true)]
    async fn proven_block_costs_the_challenger() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Steal);
        script.push_target(1, 2);
        script.push_responses(vec![TurnResponse::Block {
            player: PlayerId(2),
            role: Role::Captain,
        }]);
        script.push_block_responses(vec![BlockResponse::Challenge {
            player: PlayerId(1),
        }]);
        script.push_card(0); // the failed challenger picks what to give up
        let mut game = scripted_game(2, 14, &script);
        rig_hands(
            &mut game,
            &[[Role::Duke, Role::Assassin], [Role::Captain, Role::Contessa]],
        );

        game.run().await.unwrap();

        assert_eq!(game.players()[0].influence(), 1);
        assert_eq!(game.players()[1].influence(), 2);
        // the block stood, so no coins moved
        assert_eq!(game.players()[0].coins(), 2);
        assert_eq!(game.players()[1].coins(), 2);
        assert!(script
            .events()
            .iter()
            .any(|e| matches!(e, GameEvent::ActionBlocked { .. })));
        assert_eq!(game.census(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn execution_skips_a_target_dead_from_the_block_challenge() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Assassinate);
        script.push_target(1, 2);
        script.push_responses(vec![TurnResponse::Block {
            player: PlayerId(2),
            role: Role::Contessa,
        }]);
        script.push_block_responses(vec![BlockResponse::Challenge {
            player: PlayerId(1),
        }]);
        let mut game = scripted_game(2, 19, &script);
        game.players[0].coins = 3;
        rig_hands(
            &mut game,
            &[[Role::Assassin, Role::Duke], [Role::Duke, Role::Duke]],
        );
        // the bluffing blocker is already down to their last card
        let card = game.players[1].hand.pop().unwrap();
        game.deck.return_revealed(card);

        let outcome = game.run().await.unwrap();

        // the caught bluff costs the blocker their last card, so the
        // assassination itself resolves as a no-op
        assert_eq!(outcome.winner, Some(PlayerId(1)));
        assert!(!game.players()[1].is_alive());
        assert_eq!(game.players()[0].influence(), 2);
        assert_eq!(game.players()[0].coins(), 0);
        assert_eq!(game.deck().revealed().len(), 2);
        assert_eq!(game.census(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn steal_clamps_to_the_target_balance() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Steal);
        script.push_target(1, 2);
        let mut game = scripted_game(2, 15, &script);
        game.players[1].coins = 1;

        game.run().await.unwrap();

        assert_eq!(game.players()[0].coins(), 3);
        assert_eq!(game.players()[1].coins(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exchange_preserves_hand_size_and_census() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Exchange);
        script.push_card(0); // which card goes back face-down
        let mut game = scripted_game(2, 16, &script);
        rig_hands(
            &mut game,
            &[
                [Role::Ambassador, Role::Duke],
                [Role::Captain, Role::Contessa],
            ],
        );

        game.run().await.unwrap();

        assert_eq!(game.players()[0].influence(), 2);
        assert!(game.deck().revealed().is_empty());
        assert_eq!(game.census(), 15);
        assert!(script
            .events()
            .iter()
            .any(|e| matches!(e, GameEvent::ActionResolved { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn ten_coins_force_a_coup() {
        let script = ScriptedInterface::default();
        // no action entry: selection is skipped, only the target is asked
        script.push_target(1, 2);
        let mut game = scripted_game(2, 17, &script);
        game.players[0].coins = 10;
        // the target already lost one influence earlier
        let card = game.players[1].hand.pop().unwrap();
        game.deck.return_revealed(card);

        let outcome = game.run().await.unwrap();

        assert_eq!(outcome.winner, Some(PlayerId(1)));
        assert!(!game.is_active());
        assert_eq!(game.players()[0].coins(), 3);
        assert!(!game.players()[1].is_alive());
        assert_eq!(game.eliminated(), vec![PlayerId(2)]);
        assert_eq!(game.deck().revealed().len(), 2);
        assert!(script.events().iter().any(|e| matches!(
            e,
            GameEvent::PlayerEliminated {
                player: PlayerId(2)
            }
        )));
        assert!(script.events().iter().any(|e| matches!(
            e,
            GameEvent::MatchEnded {
                winner: Some(PlayerId(1))
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_ends_the_match_without_a_winner() {
        let script = ScriptedInterface::default();
        script.push_action(1, ActionKind::Income);
        let mut game = scripted_game(2, 18, &script);
        game.handle().abort();

        let outcome = game.run().await.unwrap();

        assert_eq!(outcome.winner, None);
        assert!(!game.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_interface_plays_every_table_size_to_a_winner() {
        for players in 2..=6u64 {
            let roster = (1..=players)
                .map(|n| (PlayerId(n), format!("Player {n}")))
                .collect();
            let mut game = Game::with_rng(
                roster,
                Arc::new(AutoInterface),
                GameConfig::default(),
                Pcg64::seed_from_u64(players),
            )
            .unwrap();

            let outcome = game.run().await.unwrap();

            assert!(outcome.winner.is_some());
            assert_eq!(game.census(), 15);
            assert_eq!(
                game.players().iter().filter(|p| p.is_alive()).count(),
                1,
                "{players} players should leave one survivor"
            );
        }
    }
}
