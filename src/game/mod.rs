//! Tic-tac-toe domain: board, game state machine, events and registry

pub mod board;
pub mod event;
pub mod registry;
pub mod state;

pub use board::{Outcome, Symbol};
pub use event::{GameEvent, GameObserver};
pub use registry::{GameHandle, GameRegistry, InMemoryGameRegistry, RegistryError};
pub use state::{Game, GameError, GameState};

use serde::{Deserialize, Serialize};

/// Identity of an account holder inside games and sessions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
