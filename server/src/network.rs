//! Server network layer handling WebSocket connections and the event loop

use crate::config::ServerConfig;
use crate::connections::{ConnectionManager, FrameSender};
use crate::dispatcher::Dispatcher;
use crate::error::LobbyError;
use crate::protocol::{Outbound, ServerEvent};
use crate::world::World;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::SessionId;
use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Id following `current` in the accept loop's sequence
///
/// Wraps past `SessionId::MAX` back to 1; 0 is never handed out. An id that
/// wraps onto a connection that is still open is refused by
/// [`ConnectionManager::add`].
pub fn next_connection_id(current: SessionId) -> SessionId {
    match current.wrapping_add(1) {
        0 => 1,
        next => next,
    }
}

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    /// Handshake finished; `sender` feeds the socket's writer task
    Connected {
        connection_id: SessionId,
        addr: SocketAddr,
        sender: FrameSender,
    },
    /// A text frame arrived
    FrameReceived {
        connection_id: SessionId,
        text: String,
    },
    /// The socket is gone. `sender` identifies which socket, since a refused
    /// connection can carry the id of a live one.
    Closed {
        connection_id: SessionId,
        sender: FrameSender,
    },
}

/// Lobby server: accepts sockets and feeds their events to the dispatcher
///
/// All world mutation happens on the task running [`Server::run`]; connection
/// tasks only forward frames over a channel, so events and timer firings are
/// handled strictly one after another.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    connections: ConnectionManager,
    dispatcher: Dispatcher,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    /// Binds the listening socket and prepares the event loop
    ///
    /// Nothing is accepted until [`Server::run`] or [`Server::run_until`] is
    /// called. Binding to port 0 picks an ephemeral port; read it back with
    /// [`Server::local_addr`].
    pub async fn bind(config: ServerConfig, world: World) -> std::io::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            connections: ConnectionManager::new(config.max_connections),
            config,
            dispatcher: Dispatcher::new(world),
            server_tx,
            server_rx,
        })
    }

    /// Address the listener actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns the task accepting sockets
    ///
    /// Each socket gets the next connection id and its own task running the
    /// handshake and frame pump. Returns None if the listener was already
    /// handed to an earlier run.
    fn spawn_acceptor(&mut self) -> Option<JoinHandle<()>> {
        let listener = self.listener.take()?;
        let server_tx = self.server_tx.clone();

        Some(tokio::spawn(async move {
            let mut next_id: SessionId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let connection_id = next_id;
                        next_id = next_connection_id(next_id);
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            connection_id,
                            server_tx.clone(),
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }

                if server_tx.is_closed() {
                    break;
                }
            }
        }))
    }

    /// Serialises each event once and queues it for every recipient
    fn deliver(&self, outbound: Vec<Outbound>) {
        for Outbound { recipients, event } in outbound {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode {} event: {}", event.name(), e);
                    continue;
                }
            };

            for session_id in recipients {
                if !self.connections.send_text(session_id, &text) {
                    debug!(
                        "Dropped {} event for closed connection {}",
                        event.name(),
                        session_id
                    );
                }
            }
        }
    }

    /// Applies one message from a connection task
    ///
    /// Refused connections get an error event followed by a close frame and
    /// are never registered, so their frames are ignored.
    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Connected {
                connection_id,
                addr,
                sender,
            } => {
                if !self.connections.add(connection_id, addr, sender.clone()) {
                    let reason = if self.connections.contains(connection_id) {
                        "connection id in use"
                    } else {
                        "server full"
                    };
                    let refusal = ServerEvent::error(&LobbyError::invalid_state(reason));
                    if let Ok(text) = serde_json::to_string(&refusal) {
                        let _ = sender.send(Message::Text(text));
                    }
                    let _ = sender.send(Message::Close(None));
                }
            }
            ServerMessage::FrameReceived {
                connection_id,
                text,
            } => {
                if !self.connections.contains(connection_id) {
                    return;
                }
                self.connections.touch(connection_id);
                let outbound = self
                    .dispatcher
                    .handle_text(connection_id, &text, now_millis());
                self.deliver(outbound);
            }
            ServerMessage::Closed {
                connection_id,
                sender,
            } => {
                if self.connections.owns(connection_id, &sender) {
                    self.drop_connection(connection_id);
                }
            }
        }
    }

    /// Forgets a connection and runs the disconnect cascade for its session
    fn drop_connection(&mut self, connection_id: SessionId) {
        self.connections.remove(connection_id);
        let outbound = self.dispatcher.handle_disconnect(connection_id);
        self.deliver(outbound);
    }

    fn close_idle_connections(&mut self) {
        let Some(timeout) = self.config.idle_timeout else {
            return;
        };

        for connection_id in self.connections.timed_out(timeout) {
            warn!("Connection {} idle for too long, closing", connection_id);
            self.connections.send_close(connection_id);
            self.drop_connection(connection_id);
        }
    }

    /// Runs the event loop until the process stops
    pub async fn run(&mut self) {
        self.run_until(std::future::pending::<()>()).await;
    }

    /// Runs the event loop until `shutdown` resolves
    ///
    /// Client frames, the lobby snapshot timer and the round expiry sweep all
    /// go through this one loop, each handled to completion before the next.
    /// The sweep tick also closes idle connections. On exit the accept task is
    /// aborted; sockets already open see their channel close and wind down.
    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) {
        let acceptor = self.spawn_acceptor();

        let mut lobby_timer = interval(self.config.lobby_interval);
        lobby_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep_timer = interval(self.config.sweep_interval);
        sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first ticks since they fire immediately
        lobby_timer.tick().await;
        sweep_timer.tick().await;

        tokio::pin!(shutdown);
        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => break,
                    }
                },

                _ = lobby_timer.tick() => {
                    let outbound = self.dispatcher.lobby_tick();
                    self.deliver(outbound);
                },

                _ = sweep_timer.tick() => {
                    let outbound = self.dispatcher.expiry_sweep(now_millis());
                    self.deliver(outbound);
                    self.close_idle_connections();
                },

                _ = &mut shutdown => {
                    info!("Server shutting down");
                    break;
                },
            }
        }

        if let Some(acceptor) = acceptor {
            acceptor.abort();
        }
    }
}

/// Performs the WebSocket handshake and pumps frames between the socket and
/// the main loop until either side closes
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_id: SessionId,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Message>();

    if server_tx
        .send(ServerMessage::Connected {
            connection_id,
            addr,
            sender: frame_tx.clone(),
        })
        .is_err()
    {
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let closing = matches!(frame, Message::Close(_));
            if ws_sender.send(frame).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if server_tx
                    .send(ServerMessage::FrameReceived {
                        connection_id,
                        text,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Connection {} read error: {}", connection_id, e);
                break;
            }
        }
    }

    writer.abort();
    let _ = server_tx.send(ServerMessage::Closed {
        connection_id,
        sender: frame_tx,
    });
}
