//! Outward notification contract for player sessions
//!
//! The session layer translates domain events into calls on this trait.
//! Implementations are invoked while the game lock is held: they must only
//! enqueue, never block on I/O.

use crate::game::Symbol;

/// Per-player delivery channel for game notifications
pub trait EventNotifier: Send + Sync {
    fn game_started(&self, player_session_id: &str);

    /// `winner` is None for a draw
    fn game_ended(&self, player_session_id: &str, winner: Option<Symbol>);

    fn new_move(&self, player_session_id: &str, symbol: Symbol, x: usize, y: usize);

    /// Arm delivery once the remote subscriber is attached
    fn enable_event_notification(&self, player_session_id: &str);
}
