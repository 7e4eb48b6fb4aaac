//! Logged-in user session

use std::sync::Arc;

use crate::game::{Symbol, UserId};
use crate::notify::EventNotifier;
use crate::service::{GameSessionService, ServiceError};

use super::PlayerSession;

/// Authenticated actor. Created on login, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    session_id: String,
    user_id: UserId,
}

impl UserSession {
    pub fn new(session_id: String, user_id: UserId) -> Self {
        Self {
            session_id,
            user_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn create_new_game(
        &self,
        service: &GameSessionService,
        game_id: &str,
    ) -> Result<(), ServiceError> {
        service.create_new_game(game_id)
    }

    /// Join a game as this user, producing the player's session
    pub fn join_game(
        &self,
        service: &GameSessionService,
        game_id: &str,
        symbol: Symbol,
        notifier: Arc<dyn EventNotifier>,
    ) -> Result<Arc<PlayerSession>, ServiceError> {
        service.join_game(&self.user_id, game_id, symbol, notifier)
    }
}
