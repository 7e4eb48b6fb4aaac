//! WebSocket protocol message definitions
//! These are the wire types for the event channel

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::Symbol;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Attach this connection to a player session's events
    Subscribe { player_session_id: String },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { connection_id: Uuid, server_time: u64 },

    /// Subscription accepted, events follow
    Subscribed { player_session_id: String },

    /// Both players joined
    GameStarted { player_session_id: String },

    /// A move was accepted
    NewMove {
        player_session_id: String,
        symbol: Symbol,
        x: usize,
        y: usize,
    },

    /// Game over. `winner` is null for a draw.
    GameEnded {
        player_session_id: String,
        winner: Option<Symbol>,
    },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
