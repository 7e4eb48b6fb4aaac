//! Domain events emitted by a game

use super::board::Symbol;

/// Closed set of events a game emits to its observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Both symbols assigned, moves are now accepted
    GameStarted { game_id: String },
    /// An accepted move
    NewMove {
        game_id: String,
        symbol: Symbol,
        x: usize,
        y: usize,
    },
    /// Terminal move applied. `winner` is None for a draw.
    GameEnded {
        game_id: String,
        winner: Option<Symbol>,
    },
}

impl GameEvent {
    pub fn game_id(&self) -> &str {
        match self {
            GameEvent::GameStarted { game_id }
            | GameEvent::NewMove { game_id, .. }
            | GameEvent::GameEnded { game_id, .. } => game_id,
        }
    }
}

/// Listener registered on a game.
///
/// Called while the game's lock is held, so implementations must not block
/// or call back into the same game.
pub trait GameObserver: Send + Sync {
    fn notify_game_event(&self, event: &GameEvent);
}
