//! Game aggregate and its lifecycle state machine

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use serde::Serialize;
use tracing::{debug, info};

use super::board::{Board, BoardError, Outcome, Symbol};
use super::event::{GameEvent, GameObserver};
use super::UserId;

/// Game lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameState {
    /// Created, waiting for both symbols to be taken
    WaitingForPlayers,
    /// Moves accepted
    InProgress,
    /// Terminal
    Finished,
}

/// Rejected join or move
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Symbol {0} is already taken")]
    SymbolAlreadyTaken(Symbol),

    #[error("User already joined this game")]
    UserAlreadyJoined,

    #[error("Game is no longer accepting players")]
    GameNotWaiting,

    #[error("Game is not in progress")]
    GameNotInProgress,

    #[error("User is not a player in this game")]
    NotAPlayer,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid move: {0}")]
    InvalidMove(#[from] BoardError),
}

impl GameError {
    /// Stable code used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            GameError::SymbolAlreadyTaken(_) => "symbol-already-taken",
            GameError::UserAlreadyJoined => "user-already-joined",
            GameError::GameNotWaiting => "game-not-waiting",
            GameError::GameNotInProgress => "game-not-in-progress",
            GameError::NotAPlayer => "not-a-player",
            GameError::NotYourTurn => "not-your-turn",
            GameError::InvalidMove(_) => "invalid-move",
        }
    }
}

/// The authoritative game
pub struct Game {
    id: String,
    state: GameState,
    players: HashMap<Symbol, UserId>,
    turn: Symbol,
    board: Board,
    observers: Vec<Weak<dyn GameObserver>>,
    result: Option<Outcome>,
}

impl Game {
    /// New game with an empty board and no players
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: GameState::WaitingForPlayers,
            players: HashMap::new(),
            turn: Symbol::X,
            board: Board::new(),
            observers: Vec::new(),
            result: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn turn(&self) -> Symbol {
        self.turn
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Win or draw, set once on entry to `Finished`
    pub fn result(&self) -> Option<Outcome> {
        self.result
    }

    pub fn player(&self, symbol: Symbol) -> Option<&UserId> {
        self.players.get(&symbol)
    }

    /// Symbol held by a user, if any
    pub fn symbol_of(&self, user_id: &UserId) -> Option<Symbol> {
        self.players
            .iter()
            .find(|(_, u)| *u == user_id)
            .map(|(s, _)| *s)
    }

    /// Validate a join without changing anything.
    ///
    /// Slot checks come first: a started or finished game has both symbols
    /// assigned, so a late join reports the taken symbol.
    pub fn check_join(&self, user_id: &UserId, symbol: Symbol) -> Result<(), GameError> {
        if self.players.contains_key(&symbol) {
            return Err(GameError::SymbolAlreadyTaken(symbol));
        }
        if self.symbol_of(user_id).is_some() {
            return Err(GameError::UserAlreadyJoined);
        }
        if self.state != GameState::WaitingForPlayers {
            return Err(GameError::GameNotWaiting);
        }
        Ok(())
    }

    /// Assign a symbol to a user. Starts the game once both symbols are taken.
    pub fn join_game(&mut self, user_id: UserId, symbol: Symbol) -> Result<(), GameError> {
        self.check_join(&user_id, symbol)?;

        info!(game_id = %self.id, user_id = %user_id, symbol = %symbol, "Player joined game");
        self.players.insert(symbol, user_id);

        if self.players.len() == 2 {
            self.state = GameState::InProgress;
            info!(game_id = %self.id, "Game started");
            self.emit(GameEvent::GameStarted {
                game_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Apply a move for the user whose turn it is
    pub fn make_move(&mut self, user_id: &UserId, x: usize, y: usize) -> Result<(), GameError> {
        if self.state != GameState::InProgress {
            return Err(GameError::GameNotInProgress);
        }

        let symbol = self.symbol_of(user_id).ok_or(GameError::NotAPlayer)?;
        if symbol != self.turn {
            return Err(GameError::NotYourTurn);
        }

        self.board.place(symbol, x, y)?;
        self.turn = symbol.opponent();

        debug!(game_id = %self.id, symbol = %symbol, x, y, "Move accepted");
        self.emit(GameEvent::NewMove {
            game_id: self.id.clone(),
            symbol,
            x,
            y,
        });

        self.check_end_condition();
        Ok(())
    }

    /// Register a listener. Registering the same observer twice duplicates delivery.
    pub fn add_observer<O>(&mut self, observer: &Arc<O>)
    where
        O: GameObserver + 'static,
    {
        let observer: Arc<dyn GameObserver> = observer.clone();
        self.observers.push(Arc::downgrade(&observer));
    }

    /// Number of live observers
    #[cfg(test)]
    pub fn observer_count(&self) -> usize {
        self.observers
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    fn check_end_condition(&mut self) {
        let outcome = self.board.evaluate();
        let winner = match outcome {
            Outcome::Undecided => return,
            Outcome::Win(symbol) => Some(symbol),
            Outcome::Draw => None,
        };

        self.result = Some(outcome);
        self.state = GameState::Finished;
        info!(game_id = %self.id, ?outcome, "Game ended");

        self.emit(GameEvent::GameEnded {
            game_id: self.id.clone(),
            winner,
        });
    }

    /// Deliver to every live observer, dropping dead registrations
    fn emit(&mut self, event: GameEvent) {
        self.observers.retain(|weak| match weak.upgrade() {
            Some(observer) => {
                observer.notify_game_event(&event);
                true
            }
            None => false,
        });
    }
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("players", &self.players)
            .field("turn", &self.turn)
            .field("board", &self.board)
            .field("observers", &self.observers.len())
            .field("result", &self.result)
            .finish()
    }
}
