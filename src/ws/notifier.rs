//! Channel-backed event notifier
//!
//! Events raised while no subscriber is armed are held in a bounded buffer
//! (oldest dropped on overflow). Arming flushes the buffer in order, after
//! which events go straight into the subscriber's bounded channel. A
//! subscriber that goes away disarms the notifier, so events buffer again
//! until the next subscribe.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::game::Symbol;
use crate::notify::EventNotifier;
use crate::ws::protocol::ServerMsg;

struct NotifierState {
    armed: bool,
    pending: VecDeque<ServerMsg>,
    subscriber: Option<mpsc::Sender<ServerMsg>>,
    /// Bumped on every attach so a stale connection cannot detach its successor
    generation: u64,
}

impl NotifierState {
    fn buffer(&mut self, capacity: usize, msg: ServerMsg) {
        if self.pending.len() >= capacity {
            self.pending.pop_front();
            warn!(capacity, "Event buffer full, dropped oldest event");
        }
        self.pending.push_back(msg);
    }

    fn forward(&mut self, capacity: usize, msg: ServerMsg) {
        let Some(tx) = self.subscriber.as_ref() else {
            self.buffer(capacity, msg);
            return;
        };

        match tx.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Subscriber lagging, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(msg)) => {
                debug!("Subscriber gone, buffering until the next subscribe");
                self.subscriber = None;
                self.armed = false;
                self.buffer(capacity, msg);
            }
        }
    }
}

/// Notifier for one player session
pub struct ChannelNotifier {
    capacity: usize,
    state: Mutex<NotifierState>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(NotifierState {
                armed: false,
                pending: VecDeque::with_capacity(capacity),
                subscriber: None,
                generation: 0,
            }),
        }
    }

    /// Bind a new subscriber, replacing any previous one.
    ///
    /// Delivery stays disarmed until `enable_event_notification`, so the
    /// caller can queue its own messages ahead of the flushed events.
    pub fn attach(&self) -> (u64, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut state = self.state.lock();
        state.generation += 1;
        state.armed = false;
        if state.subscriber.replace(tx).is_some() {
            debug!(generation = state.generation, "Previous subscriber replaced");
        }
        (state.generation, rx)
    }

    /// Unbind the subscriber from `generation`. Later events buffer again.
    pub fn detach(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }
        state.subscriber = None;
        state.armed = false;
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.state.lock().armed
    }

    /// Events waiting for a subscriber to arm delivery
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    fn deliver(&self, msg: ServerMsg) {
        let mut state = self.state.lock();
        if state.armed {
            state.forward(self.capacity, msg);
        } else {
            state.buffer(self.capacity, msg);
        }
    }
}

impl EventNotifier for ChannelNotifier {
    fn game_started(&self, player_session_id: &str) {
        self.deliver(ServerMsg::GameStarted {
            player_session_id: player_session_id.to_string(),
        });
    }

    fn game_ended(&self, player_session_id: &str, winner: Option<Symbol>) {
        self.deliver(ServerMsg::GameEnded {
            player_session_id: player_session_id.to_string(),
            winner,
        });
    }

    fn new_move(&self, player_session_id: &str, symbol: Symbol, x: usize, y: usize) {
        self.deliver(ServerMsg::NewMove {
            player_session_id: player_session_id.to_string(),
            symbol,
            x,
            y,
        });
    }

    fn enable_event_notification(&self, player_session_id: &str) {
        let mut state = self.state.lock();
        if state.armed {
            return;
        }
        if state.subscriber.is_none() {
            debug!(player_session_id, "No subscriber attached, staying disarmed");
            return;
        }

        let pending = std::mem::take(&mut state.pending);
        let flushed = pending.len();
        state.armed = true;
        for msg in pending {
            state.forward(self.capacity, msg);
        }
        info!(player_session_id, flushed, "Event notification enabled");
    }
}
