//! Game session service - orchestrates accounts, sessions, games and notifiers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::account::{Account, AccountError, AccountInfo, AccountRepository};
use crate::game::{
    Game, GameError, GameRegistry, GameState, Outcome, RegistryError, Symbol, UserId,
};
use crate::notify::EventNotifier;
use crate::session::{PlayerSession, UserSession};

/// Failure of a service operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Account already present")]
    AccountAlreadyPresent,

    #[error("Account not found")]
    AccountNotFound,

    /// Same error for unknown user and wrong password
    #[error("Login failed")]
    LoginFailed,

    #[error("Game already present")]
    GameAlreadyPresent,

    #[error("Game not found")]
    GameNotFound,

    #[error("User session not found")]
    UserSessionNotFound,

    #[error("Player session not found")]
    PlayerSessionNotFound,

    #[error(transparent)]
    Game(#[from] GameError),
}

impl ServiceError {
    /// Stable code used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::AccountAlreadyPresent => "account-already-present",
            ServiceError::AccountNotFound => "account-not-present",
            ServiceError::LoginFailed => "login-failed",
            ServiceError::GameAlreadyPresent => "game-already-present",
            ServiceError::GameNotFound => "game-not-present",
            ServiceError::UserSessionNotFound => "user-session-not-present",
            ServiceError::PlayerSessionNotFound => "player-session-not-present",
            ServiceError::Game(e) => e.code(),
        }
    }
}

impl From<RegistryError> for ServiceError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::AlreadyPresent(_) => ServiceError::GameAlreadyPresent,
            RegistryError::NotFound(_) => ServiceError::GameNotFound,
        }
    }
}

impl From<AccountError> for ServiceError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::AlreadyPresent(_) => ServiceError::AccountAlreadyPresent,
            AccountError::NotFound(_) => ServiceError::AccountNotFound,
        }
    }
}

/// Point-in-time view of a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameInfo {
    pub game_id: String,
    pub game_state: GameState,
    /// Row-major cells, "" for empty
    pub board_state: Vec<String>,
    /// Present while the game is in progress
    pub turn: Option<Symbol>,
    pub result: Option<Outcome>,
    pub player_x: Option<UserId>,
    pub player_o: Option<UserId>,
}

/// Entry point for every game-session operation
pub struct GameSessionService {
    accounts: Arc<dyn AccountRepository>,
    games: Arc<dyn GameRegistry>,
    user_sessions: DashMap<String, Arc<UserSession>>,
    player_sessions: DashMap<String, Arc<PlayerSession>>,
    user_session_count: AtomicU64,
    player_session_count: AtomicU64,
}

impl GameSessionService {
    pub fn new(accounts: Arc<dyn AccountRepository>, games: Arc<dyn GameRegistry>) -> Self {
        Self {
            accounts,
            games,
            user_sessions: DashMap::new(),
            player_sessions: DashMap::new(),
            user_session_count: AtomicU64::new(0),
            player_session_count: AtomicU64::new(0),
        }
    }

    /// Create an account
    pub fn register_user(&self, user_name: &str, password: &str) -> Result<AccountInfo, ServiceError> {
        info!(user_name, "Register user");
        let account = Account::new(user_name, password);
        let info = account.info();
        self.accounts.add_account(account)?;
        Ok(info)
    }

    pub fn account_info(&self, user_name: &str) -> Result<AccountInfo, ServiceError> {
        Ok(self.accounts.get_account(user_name)?.info())
    }

    /// Authenticate and open a new user session
    pub fn login(&self, user_name: &str, password: &str) -> Result<Arc<UserSession>, ServiceError> {
        if !self.accounts.is_valid(user_name, password) {
            warn!(user_name, "Login failed");
            return Err(ServiceError::LoginFailed);
        }

        let n = self.user_session_count.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Arc::new(UserSession::new(
            format!("user-session-{}", n),
            UserId::new(user_name),
        ));
        self.user_sessions
            .insert(session.session_id().to_string(), session.clone());

        info!(user_name, session_id = %session.session_id(), "User logged in");
        Ok(session)
    }

    pub fn user_session(&self, session_id: &str) -> Result<Arc<UserSession>, ServiceError> {
        self.user_sessions
            .get(session_id)
            .map(|s| s.value().clone())
            .ok_or(ServiceError::UserSessionNotFound)
    }

    pub fn player_session(&self, session_id: &str) -> Result<Arc<PlayerSession>, ServiceError> {
        self.player_sessions
            .get(session_id)
            .map(|s| s.value().clone())
            .ok_or(ServiceError::PlayerSessionNotFound)
    }

    /// Create a game in `WaitingForPlayers`
    pub fn create_new_game(&self, game_id: &str) -> Result<(), ServiceError> {
        self.games.add_game(Game::new(game_id))?;
        info!(game_id, "Created new game");
        Ok(())
    }

    pub fn game_info(&self, game_id: &str) -> Result<GameInfo, ServiceError> {
        let handle = self.games.get_game(game_id)?;
        let game = handle.lock();
        Ok(GameInfo {
            game_id: game.id().to_string(),
            game_state: game.state(),
            board_state: game.board().snapshot(),
            turn: (game.state() == GameState::InProgress).then(|| game.turn()),
            result: game.result(),
            player_x: game.player(Symbol::X).cloned(),
            player_o: game.player(Symbol::O).cloned(),
        })
    }

    /// Join a game and wire the player's session to its events.
    ///
    /// Validation, observer registration and the join itself run under one
    /// hold of the game lock, so the joining player also receives
    /// `GameStarted` when its join completes the game.
    pub fn join_game(
        &self,
        user_id: &UserId,
        game_id: &str,
        symbol: Symbol,
        notifier: Arc<dyn EventNotifier>,
    ) -> Result<Arc<PlayerSession>, ServiceError> {
        let handle = self.games.get_game(game_id)?;
        let mut game = handle.lock();
        game.check_join(user_id, symbol)?;

        let n = self.player_session_count.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Arc::new(PlayerSession::new(
            format!("player-session-{}", n),
            user_id.clone(),
            symbol,
            game_id.to_string(),
            handle.clone(),
            notifier,
        ));
        self.player_sessions
            .insert(session.id().to_string(), session.clone());

        game.add_observer(&session);
        game.join_game(user_id.clone(), symbol)?;

        info!(
            game_id,
            user_id = %user_id,
            symbol = %symbol,
            player_session_id = %session.id(),
            "Player session created"
        );
        Ok(session)
    }

    /// Submit a move through a player session
    pub fn make_move(&self, player_session_id: &str, x: usize, y: usize) -> Result<(), ServiceError> {
        let session = self.player_session(player_session_id)?;
        session.make_move(x, y).map_err(|e| {
            warn!(player_session_id, x, y, error = %e, "Move rejected");
            ServiceError::from(e)
        })
    }

    pub fn active_games(&self) -> usize {
        self.games.len()
    }

    pub fn user_session_count(&self) -> usize {
        self.user_sessions.len()
    }

    pub fn player_session_count(&self) -> usize {
        self.player_sessions.len()
    }
}
