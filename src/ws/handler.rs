//! WebSocket upgrade handler for the event channel

use std::sync::Arc;
use crate::notify::EventNotifier;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::service::ServiceError;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::ChannelNotifier;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "New event channel connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        connection_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(connection_id = %connection_id, error = %e, "Failed to send welcome");
        return;
    }

    run_session(connection_id, state, ws_sink, ws_stream).await;

    info!(connection_id = %connection_id, "Event channel closed");
}

/// Run the connection with read/write split
async fn run_session(
    connection_id: Uuid,
    state: AppState,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
) {
    let rate_limiter = ConnectionRateLimiter::new(state.config.ws_message_rate);
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(state.config.event_buffer_capacity);

    // Writer task: replies and game events -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let mut subscription: Option<Subscription> = None;

    // Reader loop: WebSocket -> service
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!(connection_id = %connection_id, "Rate limited client message");
                    continue;
                }

                let reply = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Subscribe { player_session_id }) if subscription.is_none() => {
                        match subscribe(&state, &player_session_id, out_tx.clone()).await {
                            Ok(sub) => {
                                subscription = Some(sub);
                                None
                            }
                            Err(reply) => Some(reply),
                        }
                    }
                    Ok(ClientMsg::Subscribe { .. }) => Some(ServerMsg::error(
                        "already-subscribed",
                        "Connection already has a subscription",
                    )),
                    Ok(ClientMsg::Ping { t }) => Some(ServerMsg::Pong { t }),
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
                        Some(ServerMsg::error("bad-message", e.to_string()))
                    }
                };

                if let Some(reply) = reply {
                    if out_tx.send(reply).await.is_err() {
                        debug!(connection_id = %connection_id, "Writer closed");
                        break;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(connection_id = %connection_id, "Received control frame");
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    if let Some(sub) = subscription {
        sub.close();
    }
    writer_handle.abort();
}

/// A connection's binding to one player session's notifier
struct Subscription {
    notifier: Arc<ChannelNotifier>,
    generation: u64,
    forwarder: JoinHandle<()>,
}

impl Subscription {
    /// Stop forwarding. Events raised from now on wait for the next subscriber.
    fn close(self) {
        self.forwarder.abort();
        self.notifier.detach(self.generation);
    }
}

/// Attach a player session's notifier to this connection and arm it.
///
/// A later subscribe for the same player session replaces this one.
/// `Subscribed` is queued before arming so it precedes any flushed event.
async fn subscribe(
    state: &AppState,
    player_session_id: &str,
    out_tx: mpsc::Sender<ServerMsg>,
) -> Result<Subscription, ServerMsg> {
    let session = state
        .service
        .player_session(player_session_id)
        .map_err(|e| ServerMsg::error(e.code(), e.to_string()))?;

    let notifier = state
        .notifiers
        .get(player_session_id)
        .map(|n| n.value().clone())
        .ok_or_else(|| {
            let e = ServiceError::PlayerSessionNotFound;
            ServerMsg::error(e.code(), e.to_string())
        })?;

    out_tx
        .send(ServerMsg::Subscribed {
            player_session_id: player_session_id.to_string(),
        })
        .await
        .map_err(|_| ServerMsg::error("connection-closed", "Connection is closing"))?;

    let (generation, mut events) = notifier.attach();
    let pending = notifier.pending_len();
    let forwarder = tokio::spawn(async move {
        while let Some(msg) = events.recv().await {
            if out_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    notifier.enable_event_notification(player_session_id);

    info!(
        player_session_id,
        game_id = %session.game_id(),
        user_id = %session.user_id(),
        generation,
        pending,
        "Event channel subscribed"
    );
    Ok(Subscription {
        notifier,
        generation,
        forwarder,
    })
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::Symbol;
    use crate::session::PlayerSession;

    /// Two logged-in players seated in "g1", so the game has started
    fn started_game(state: &AppState) -> (Arc<PlayerSession>, Arc<PlayerSession>) {
        let mut seats = Vec::new();
        for (name, symbol) in [("alice", Symbol::X), ("bob", Symbol::O)] {
            state.service.register_user(name, "pw").unwrap();
            let user = state.service.login(name, "pw").unwrap();
            if symbol == Symbol::X {
                user.create_new_game(&state.service, "g1").unwrap();
            }
            seats.push(state.join_game(&user, "g1", symbol).unwrap());
        }
        let o = seats.pop().unwrap();
        let x = seats.pop().unwrap();
        (x, o)
    }

    fn subscribed(id: &str) -> ServerMsg {
        ServerMsg::Subscribed {
            player_session_id: id.to_string(),
        }
    }

    fn started(id: &str) -> ServerMsg {
        ServerMsg::GameStarted {
            player_session_id: id.to_string(),
        }
    }

    fn moved(id: &str, symbol: Symbol, x: usize, y: usize) -> ServerMsg {
        ServerMsg::NewMove {
            player_session_id: id.to_string(),
            symbol,
            x,
            y,
        }
    }

    #[tokio::test]
    async fn test_confirmation_precedes_buffered_events() {
        let state = AppState::new(Config::default());
        let (x, o) = started_game(&state);
        state.service.make_move(x.id(), 1, 1).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let sub = subscribe(&state, x.id(), tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(subscribed(x.id())));
        assert_eq!(rx.recv().await, Some(started(x.id())));
        assert_eq!(rx.recv().await, Some(moved(x.id(), Symbol::X, 1, 1)));

        state.service.make_move(o.id(), 0, 0).unwrap();
        assert_eq!(rx.recv().await, Some(moved(x.id(), Symbol::O, 0, 0)));
        sub.close();
    }

    #[tokio::test]
    async fn test_unknown_player_session_is_rejected() {
        let state = AppState::new(Config::default());
        let (tx, mut rx) = mpsc::channel(4);

        let reply = subscribe(&state, "player-session-42", tx).await.err();
        match reply {
            Some(ServerMsg::Error { code, .. }) => assert_eq!(code, "player-session-not-present"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_resubscribe_after_disconnect_gets_missed_events() {
        let state = AppState::new(Config::default());
        let (x, o) = started_game(&state);

        let (tx, mut rx) = mpsc::channel(16);
        let sub = subscribe(&state, o.id(), tx).await.unwrap();
        assert_eq!(rx.recv().await, Some(subscribed(o.id())));
        assert_eq!(rx.recv().await, Some(started(o.id())));
        sub.close();

        state.service.make_move(x.id(), 2, 2).unwrap();
        let notifier = state.notifiers.get(o.id()).unwrap().value().clone();
        assert!(!notifier.is_armed());
        assert_eq!(notifier.pending_len(), 1);

        let (tx, mut rx) = mpsc::channel(16);
        let _sub = subscribe(&state, o.id(), tx).await.unwrap();
        assert_eq!(rx.recv().await, Some(subscribed(o.id())));
        assert_eq!(rx.recv().await, Some(moved(o.id(), Symbol::X, 2, 2)));
    }

    #[tokio::test]
    async fn test_second_subscriber_takes_over() {
        let state = AppState::new(Config::default());
        let (x, _o) = started_game(&state);

        let (first_tx, mut first_rx) = mpsc::channel(16);
        let _first = subscribe(&state, x.id(), first_tx).await.unwrap();
        assert_eq!(first_rx.recv().await, Some(subscribed(x.id())));
        assert_eq!(first_rx.recv().await, Some(started(x.id())));

        let (second_tx, mut second_rx) = mpsc::channel(16);
        let _second = subscribe(&state, x.id(), second_tx).await.unwrap();
        assert_eq!(second_rx.recv().await, Some(subscribed(x.id())));

        state.service.make_move(x.id(), 0, 0).unwrap();
        assert_eq!(second_rx.recv().await, Some(moved(x.id(), Symbol::X, 0, 0)));
        assert_eq!(first_rx.recv().await, None);
    }
}
