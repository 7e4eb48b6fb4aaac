//! Per-player, per-game session

use std::sync::Arc;

use tracing::debug;

use crate::game::{GameError, GameEvent, GameHandle, GameObserver, Symbol, UserId};
use crate::notify::EventNotifier;

/// Handle a player uses to move in one game and receive its events
pub struct PlayerSession {
    id: String,
    user_id: UserId,
    game_id: String,
    symbol: Symbol,
    game: GameHandle,
    notifier: Arc<dyn EventNotifier>,
}

impl PlayerSession {
    /// `game_id` is passed in so construction never needs the game lock
    pub fn new(
        id: String,
        user_id: UserId,
        symbol: Symbol,
        game_id: String,
        game: GameHandle,
        notifier: Arc<dyn EventNotifier>,
    ) -> Self {
        Self {
            id,
            user_id,
            game_id,
            symbol,
            game,
            notifier,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// Submit a move as this player
    pub fn make_move(&self, x: usize, y: usize) -> Result<(), GameError> {
        self.game.lock().make_move(&self.user_id, x, y)
    }
}

impl GameObserver for PlayerSession {
    fn notify_game_event(&self, event: &GameEvent) {
        debug!(
            player_session_id = %self.id,
            game_id = %event.game_id(),
            ?event,
            "Game event"
        );
        match event {
            GameEvent::GameStarted { .. } => self.notifier.game_started(&self.id),
            GameEvent::NewMove { symbol, x, y, .. } => {
                self.notifier.new_move(&self.id, *symbol, *x, *y)
            }
            GameEvent::GameEnded { winner, .. } => self.notifier.game_ended(&self.id, *winner),
        }
    }
}

impl std::fmt::Debug for PlayerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerSession")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("game_id", &self.game_id)
            .field("symbol", &self.symbol)
            .finish()
    }
}
