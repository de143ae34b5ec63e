//! Live WebSocket connection tracking
//!
//! This module handles the server-side bookkeeping of open sockets:
//! - Connection lifecycle (accept, close, idle timeout)
//! - Capacity enforcement
//! - Routing outbound frames to the right socket writer
//!
//! A connection id doubles as the session id of the client behind it.

use log::{info, warn};
use shared::SessionId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Outbound queue feeding one socket writer task
pub type FrameSender = mpsc::UnboundedSender<Message>;

/// One open socket
///
/// Each connection keeps:
/// - Its id, which becomes the session id once the client logs in
/// - The peer address and connection time for logging
/// - The outbound queue of its writer task
#[derive(Debug)]
pub struct Connection {
    /// Identifier handed out by the accept loop
    pub id: SessionId,
    /// Peer address, used for logging only
    pub addr: SocketAddr,
    pub connected_at: Instant,
    /// Last time any frame arrived from this socket
    pub last_seen: Instant,
    sender: FrameSender,
}

impl Connection {
    /// Creates a connection marked as active right now
    pub fn new(id: SessionId, addr: SocketAddr, sender: FrameSender) -> Self {
        let now = Instant::now();
        Self {
            id,
            addr,
            connected_at: now,
            last_seen: now,
            sender,
        }
    }

    /// Checks if the socket has been silent for longer than `timeout`
    ///
    /// Any inbound frame counts as activity, including frames the dispatcher
    /// rejects as malformed.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Queues a text frame. Returns false once the writer task has gone away.
    pub fn send_text(&self, text: &str) -> bool {
        self.sender.send(Message::Text(text.to_string())).is_ok()
    }
}

/// Every open connection, bounded by `max_connections`
///
/// The manager is owned by the server loop, so lookups and mutations never
/// race with the dispatcher. It does not allocate ids itself; the accept loop
/// does that and the manager refuses any id that is still in use.
pub struct ConnectionManager {
    /// Open connections indexed by id
    connections: HashMap<SessionId, Connection>,
    /// Maximum number of concurrent sockets allowed
    max_connections: usize,
}

impl ConnectionManager {
    /// Creates an empty manager with the given capacity limit
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: HashMap::new(),
            max_connections,
        }
    }

    /// Registers a connection
    ///
    /// Returns false when the server is at capacity or when `id` still belongs
    /// to another open socket (the accept loop's counter wrapped around onto a
    /// long-lived connection). A refused connection is never stored.
    pub fn add(&mut self, id: SessionId, addr: SocketAddr, sender: FrameSender) -> bool {
        if self.connections.len() >= self.max_connections {
            warn!("Refusing connection {} from {}: server full", id, addr);
            return false;
        }
        if self.connections.contains_key(&id) {
            warn!("Refusing connection {} from {}: id still in use", id, addr);
            return false;
        }

        info!("Connection {} opened from {}", id, addr);
        self.connections
            .insert(id, Connection::new(id, addr, sender));
        true
    }

    /// Forgets a connection, returning true if it was known.
    pub fn remove(&mut self, id: SessionId) -> bool {
        if let Some(connection) = self.connections.remove(&id) {
            info!(
                "Connection {} from {} closed after {:.1}s",
                id,
                connection.addr,
                connection.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    /// Checks whether `id` names an open, accepted connection
    ///
    /// Frames from sockets that were refused at accept time fail this check
    /// and are dropped before they reach the dispatcher.
    pub fn contains(&self, id: SessionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Checks whether the connection stored under `id` writes through `sender`
    ///
    /// A refused socket may share its id with a live one; its close must not
    /// tear down the live connection.
    pub fn owns(&self, id: SessionId, sender: &FrameSender) -> bool {
        self.connections
            .get(&id)
            .map_or(false, |connection| connection.sender.same_channel(sender))
    }

    /// Records inbound activity, resetting the idle timer
    pub fn touch(&mut self, id: SessionId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.last_seen = Instant::now();
        }
    }

    /// Sends a text frame to one connection
    ///
    /// Unknown ids are skipped. Returns false if the frame could not be queued,
    /// either because the id is unknown or because its writer already exited.
    pub fn send_text(&self, id: SessionId, text: &str) -> bool {
        match self.connections.get(&id) {
            Some(connection) => connection.send_text(text),
            None => false,
        }
    }

    /// Asks the writer task to send a close frame and stop.
    pub fn send_close(&self, id: SessionId) {
        if let Some(connection) = self.connections.get(&id) {
            let _ = connection.sender.send(Message::Close(None));
        }
    }

    /// Ids of connections idle for longer than `timeout`
    ///
    /// The caller is responsible for closing and removing them.
    pub fn timed_out(&self, timeout: Duration) -> Vec<SessionId> {
        self.connections
            .iter()
            .filter(|(_, connection)| connection.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_connection_creation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = Connection::new(1, test_addr(), tx);

        assert_eq!(connection.id, 1);
        assert_eq!(connection.addr, test_addr());
        assert!(!connection.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_connection_timeout() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut connection = Connection::new(1, test_addr(), tx);

        connection.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(connection.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_capacity_enforced() {
        let mut manager = ConnectionManager::new(1);
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        assert!(manager.add(1, test_addr(), tx1));
        assert!(!manager.add(2, test_addr2(), tx2));
        assert_eq!(manager.len(), 1);
        assert!(!manager.contains(2));
    }

    #[test]
    fn test_duplicate_id_refused() {
        let mut manager = ConnectionManager::new(4);
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        assert!(manager.add(1, test_addr(), tx1.clone()));
        assert!(!manager.add(1, test_addr2(), tx2.clone()));

        assert_eq!(manager.len(), 1);
        assert!(manager.owns(1, &tx1));
        assert!(!manager.owns(1, &tx2));
        assert!(!manager.owns(2, &tx1));
    }

    #[test]
    fn test_remove_connection() {
        let mut manager = ConnectionManager::new(4);
        let (tx, _rx) = mpsc::unbounded_channel();
        manager.add(1, test_addr(), tx);

        assert!(manager.remove(1));
        assert!(!manager.remove(1));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_send_text_reaches_queue() {
        let mut manager = ConnectionManager::new(4);
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.add(1, test_addr(), tx);

        assert!(manager.send_text(1, "hello"));
        assert!(!manager.send_text(2, "nobody"));

        match rx.try_recv().unwrap() {
            Message::Text(text) => assert_eq!(text, "hello"),
            other => panic!("Unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_send_after_writer_dropped() {
        let mut manager = ConnectionManager::new(4);
        let (tx, rx) = mpsc::unbounded_channel();
        manager.add(1, test_addr(), tx);
        drop(rx);

        assert!(!manager.send_text(1, "late"));
    }

    #[test]
    fn test_timed_out_listing() {
        let mut manager = ConnectionManager::new(4);
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        manager.add(1, test_addr(), tx1);
        manager.add(2, test_addr2(), tx2);

        if let Some(connection) = manager.connections.get_mut(&1) {
            connection.last_seen = Instant::now() - Duration::from_secs(10);
        }
        manager.touch(2);

        assert_eq!(manager.timed_out(Duration::from_secs(5)), vec![1]);
    }
}
