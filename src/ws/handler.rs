//! WebSocket upgrade handler

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::session::{Session, SessionCoordinator};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Outbound messages queued per connection before forwarders wait
const OUTBOUND_CAPACITY: usize = 128;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection bookkeeping owned by the reader loop
struct Connection {
    session: Session,
    outbound: mpsc::Sender<ServerMsg>,
    /// One task per joined match, piping match broadcasts to `outbound`
    forwarders: HashMap<String, JoinHandle<()>>,
    rate_limiter: ConnectionRateLimiter,
}

impl Connection {
    fn new(connection_id: Uuid, outbound: mpsc::Sender<ServerMsg>) -> Self {
        Self {
            session: Session::new(connection_id),
            outbound,
            forwarders: HashMap::new(),
            rate_limiter: ConnectionRateLimiter::new(),
        }
    }

    /// Queue a direct reply; dropped if the writer is gone or full
    fn reply(&self, msg: ServerMsg) {
        if let Err(e) = self.outbound.try_send(msg) {
            debug!(connection_id = %self.session.connection_id, error = %e, "Dropped direct reply");
        }
    }

    fn subscribe(&mut self, match_id: &str, events: broadcast::Receiver<ServerMsg>) {
        // Forwarders of ended matches exit on their own once the channel closes
        self.forwarders.retain(|_, forwarder| !forwarder.is_finished());

        let forwarder = spawn_forwarder(
            self.session.connection_id,
            match_id.to_string(),
            events,
            self.outbound.clone(),
        );
        if let Some(old) = self.forwarders.insert(match_id.to_string(), forwarder) {
            old.abort();
        }
    }

    fn unsubscribe(&mut self, match_id: &str) {
        if let Some(forwarder) = self.forwarders.remove(match_id) {
            forwarder.abort();
        }
    }

    fn close(&mut self) {
        for (_, forwarder) in self.forwarders.drain() {
            forwarder.abort();
        }
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "New client connected");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_CAPACITY);

    // Writer task: queued messages -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let mut conn = Connection::new(connection_id, outbound);

    conn.reply(ServerMsg::Welcome {
        connection_id,
        server_time: unix_millis(),
    });

    // Reader loop: WebSocket -> coordinator
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_text(&state.coordinator, &mut conn, &text),
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(connection_id = %connection_id, "Received ping/pong");
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

    state.coordinator.disconnect(&mut conn.session);
    conn.close();
    writer_handle.abort();
}

/// Parse one text frame and dispatch it. Malformed frames get an error
/// reply and leave the connection open.
fn handle_text(coordinator: &SessionCoordinator, conn: &mut Connection, text: &str) {
    match serde_json::from_str::<ClientMsg>(text) {
        Ok(msg) => handle_client_msg(coordinator, conn, msg),
        Err(e) => {
            warn!(
                connection_id = %conn.session.connection_id,
                error = %e,
                "Failed to parse client message"
            );
            conn.reply(ServerMsg::error("bad_message", e.to_string()));
        }
    }
}

/// Dispatch one inbound message
fn handle_client_msg(coordinator: &SessionCoordinator, conn: &mut Connection, msg: ClientMsg) {
    match msg {
        ClientMsg::Register { identity } => {
            coordinator.register(&mut conn.session, identity);
        }
        ClientMsg::PlayerReady {
            game_id,
            bet_amount,
        } => match coordinator.join(&mut conn.session, &game_id, bet_amount) {
            Ok(joined) => conn.subscribe(&game_id, joined.events),
            Err(e) => conn.reply(ServerMsg::error(e.code(), e.to_string())),
        },
        ClientMsg::PlayerMove {
            game_id,
            y_position,
        } => {
            if !conn.rate_limiter.check_move() {
                warn!(connection_id = %conn.session.connection_id, "Rate limited paddle move");
                return;
            }
            // Late input for a finished match is expected and ignored
            coordinator.input(&conn.session, &game_id, y_position);
        }
        ClientMsg::LeaveGame { game_id } => {
            coordinator.leave(&mut conn.session, &game_id);
            conn.unsubscribe(&game_id);
        }
    }
}

/// Pipe one match's broadcasts into a connection's outbound queue
fn spawn_forwarder(
    connection_id: Uuid,
    match_id: String,
    mut events: broadcast::Receiver<ServerMsg>,
    outbound: mpsc::Sender<ServerMsg>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(msg) => {
                    if outbound.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        connection_id = %connection_id,
                        match_id = %match_id,
                        lagged_count = n,
                        "Client lagged, skipping {} messages", n
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(connection_id = %connection_id, match_id = %match_id, "Match channel closed");
                    break;
                }
            }
        }
    })
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
