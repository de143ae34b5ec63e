//! # Lobby Server Library
//!
//! This library provides the server side of a real-time multiplayer lobby:
//! clients log in with a display name, chat in the lobby, gather in
//! capacity-limited rooms and play timed fruit-eating rounds inside them.
//!
//! ## Core Responsibilities
//!
//! ### Session and Room Lifecycle
//! Tracks every logged-in session and every room, keeping room membership,
//! host delegation and session back-references consistent through joins,
//! leaves and disconnects. Empty rooms never survive.
//!
//! ### Round Simulation
//! Each playing room owns a small grid game: avatars move one cell per action,
//! eat food for points and are clamped to the arena. Rounds end when the host
//! asks or when their time runs out.
//!
//! ### Broadcasting
//! Every operation returns the events it produced together with their
//! audience (one session, the members of a room, or the whole lobby). The
//! network layer serialises and delivers them after the mutation is complete.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All state lives in one [`world::World`] owned by the
//! [`dispatcher::Dispatcher`], which in turn is owned by the task running
//! [`network::Server::run`]. Socket tasks only forward frames over a channel,
//! and the two timers (lobby snapshot, round expiry) fire on the same loop,
//! so no two events ever interleave their mutations and no locks are needed.
//!
//! ### WebSocket Transport
//! Clients speak JSON text frames over WebSocket. Each connection receives a
//! numeric id that is also its session id once it logs in.
//!
//! ## Module Organization
//!
//! - `session`: session registry
//! - `chat`: bounded chat logs
//! - `room`: room settings, room manager and membership operations
//! - `game`: rounds, moves, scoring and expiry
//! - `world`: the process-wide state and lobby operations
//! - `dispatcher`: inbound event parsing and routing
//! - `protocol`: outbound events and addressing
//! - `connections` / `network`: socket bookkeeping and the event loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::world::World;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind(ServerConfig::default(), World::new()).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod config;
pub mod connections;
pub mod dispatcher;
pub mod error;
pub mod game;
pub mod network;
pub mod protocol;
pub mod room;
pub mod session;
pub mod world;
