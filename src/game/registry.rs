//! Keyed store of live games

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::state::Game;

/// Shared handle to a game. The mutex is the game's only synchronization boundary.
pub type GameHandle = Arc<Mutex<Game>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Game already present: {0}")]
    AlreadyPresent(String),

    #[error("Game not found: {0}")]
    NotFound(String),
}

/// Storage for games, keyed by game id
pub trait GameRegistry: Send + Sync {
    /// Insert a game unless one with the same id exists
    fn add_game(&self, game: Game) -> Result<GameHandle, RegistryError>;

    fn is_present(&self, game_id: &str) -> bool;

    fn get_game(&self, game_id: &str) -> Result<GameHandle, RegistryError>;

    /// Number of stored games
    fn len(&self) -> usize;
}

/// In-memory registry, lost on restart
pub struct InMemoryGameRegistry {
    games: DashMap<String, GameHandle>,
}

impl InMemoryGameRegistry {
    pub fn new() -> Self {
        Self {
            games: DashMap::new(),
        }
    }
}

impl Default for InMemoryGameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GameRegistry for InMemoryGameRegistry {
    fn add_game(&self, game: Game) -> Result<GameHandle, RegistryError> {
        match self.games.entry(game.id().to_string()) {
            Entry::Occupied(entry) => Err(RegistryError::AlreadyPresent(entry.key().clone())),
            Entry::Vacant(entry) => {
                let handle = Arc::new(Mutex::new(game));
                entry.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    fn is_present(&self, game_id: &str) -> bool {
        self.games.contains_key(game_id)
    }

    fn get_game(&self, game_id: &str) -> Result<GameHandle, RegistryError> {
        self.games
            .get(game_id)
            .map(|g| g.value().clone())
            .ok_or_else(|| RegistryError::NotFound(game_id.to_string()))
    }

    fn len(&self) -> usize {
        self.games.len()
    }
}
