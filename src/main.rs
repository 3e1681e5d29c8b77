//! Demo driver: plays one self-running match and prints every event as
//! a JSON line.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coup_engine::{
    Action, ActionChoice, ActionKind, AutoInterface, BlockResponse, Card, CardChoice, Game,
    GameConfig, GameEvent, GameInterface, PlayerId, PublicState, Responder, TargetChoice,
    TurnResponse,
};
use tracing_subscriber::EnvFilter;

/// Delegates every decision to [`AutoInterface`] and logs the event
/// stream to stdout.
struct JsonlInterface {
    inner: AutoInterface,
}

#[async_trait]
impl GameInterface for JsonlInterface {
    async fn prompt_action(
        &self,
        state: &PublicState,
        player: PlayerId,
        options: &[ActionKind],
        responder: Responder<ActionChoice>,
    ) {
        self.inner
            .prompt_action(state, player, options, responder)
            .await;
    }

    async fn prompt_target(
        &self,
        state: &PublicState,
        action: &Action,
        options: &[PlayerId],
        responder: Responder<TargetChoice>,
    ) {
        self.inner
            .prompt_target(state, action, options, responder)
            .await;
    }

    async fn prompt_response(
        &self,
        state: &PublicState,
        action: &Action,
        responder: Responder<TurnResponse>,
    ) {
        self.inner.prompt_response(state, action, responder).await;
    }

    async fn prompt_block_response(
        &self,
        state: &PublicState,
        action: &Action,
        responder: Responder<BlockResponse>,
    ) {
        self.inner
            .prompt_block_response(state, action, responder)
            .await;
    }

    async fn prompt_card_choice(
        &self,
        player: PlayerId,
        cards: &[Card],
        responder: Responder<CardChoice>,
    ) {
        self.inner.prompt_card_choice(player, cards, responder).await;
    }

    async fn broadcast(&self, event: GameEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(%err, "unserializable event"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let roster = (1..=4u64)
        .map(|n| (PlayerId(n), format!("Player {n}")))
        .collect();
    let interface = Arc::new(JsonlInterface {
        inner: AutoInterface,
    });
    let config = GameConfig {
        response_timeout: Duration::from_millis(100),
    };

    let mut game = Game::new(roster, interface, config)?;
    let outcome = game.run().await?;
    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}
