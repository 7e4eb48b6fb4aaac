//! Application state shared across routes

use std::sync::Arc;

use dashmap::DashMap;

use crate::account::InMemoryAccountRepository;
use crate::config::Config;
use crate::game::{InMemoryGameRegistry, Symbol};
use crate::notify::EventNotifier;
use crate::service::{GameSessionService, ServiceError};
use crate::session::{PlayerSession, UserSession};
use crate::ws::ChannelNotifier;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<GameSessionService>,
    /// Notifier of each player session, keyed by player session id,
    /// waiting for (or attached to) an event channel subscriber
    pub notifiers: Arc<DashMap<String, Arc<ChannelNotifier>>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let service = GameSessionService::new(
            Arc::new(InMemoryAccountRepository::new()),
            Arc::new(InMemoryGameRegistry::new()),
        );

        Self {
            config: Arc::new(config),
            service: Arc::new(service),
            notifiers: Arc::new(DashMap::new()),
        }
    }

    /// Join a game with a fresh channel notifier and register it for the
    /// event channel under the new player session id
    pub fn join_game(
        &self,
        user_session: &UserSession,
        game_id: &str,
        symbol: Symbol,
    ) -> Result<Arc<PlayerSession>, ServiceError> {
        let notifier = Arc::new(ChannelNotifier::new(self.config.event_buffer_capacity));
        let player = user_session.join_game(
            &self.service,
            game_id,
            symbol,
            notifier.clone() as Arc<dyn EventNotifier>,
        )?;
        self.notifiers.insert(player.id().to_string(), notifier);
        Ok(player)
    }
}
