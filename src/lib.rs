//! # net-peer
//!
//! Peer-to-peer full-mesh overlay engine with shared state synchronization.
//!
//! An arbitrary number of processes discover each other, form a
//! fully-connected overlay over TCP, and keep a shared application-level
//! state value synchronized across all members. Applications drive the
//! engine through four operations (`listen`, `connect`, `broadcast`,
//! `send_data`) and four callbacks (connection received, network entered,
//! peer disconnected, data received).
//!
//! ## Quick Start
//! ```no_run
//! use net_peer::Peer;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> net_peer::Result<()> {
//!     let peer = Peer::new("alice", json!({ "players": [] }));
//!
//!     peer.on_receive_connection(|name, _conn| {
//!         println!("{name} joined");
//!     });
//!     peer.on_data(|envelope, _conn| {
//!         println!("{} -> {}", envelope.sender_name, envelope.kind);
//!     });
//!
//!     // Found a new network at a well-known port, or join an existing
//!     // one through any member.
//!     match std::env::args().nth(1) {
//!         None => {
//!             peer.listen(3000).await?;
//!         }
//!         Some(member) => {
//!             peer.connect(&member, 3000).await?;
//!         }
//!     }
//!
//!     peer.broadcast("chat-message", json!({ "text": "hello" }));
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//! - [`peer`]: the membership engine (handshake, convergence, callbacks)
//! - [`protocol`]: reserved control messages and membership set logic
//! - [`core`]: envelope wire unit and newline-delimited JSON codec
//! - [`transport`]: per-socket connection handles and I/O tasks
//! - [`config`]: engine configuration (TOML / env)
//! - [`error`]: error taxonomy
//! - [`utils`]: logging setup helpers
//!
//! ## Guarantees and Non-Goals
//! Messages on one connection arrive in send order (TCP stream semantics);
//! no ordering holds across connections. Peers are neither authenticated
//! nor encrypted, and network state does not survive the process.

pub mod config;
pub mod core;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use config::PeerConfig;
pub use core::envelope::Envelope;
pub use error::{PeerError, Result};
pub use peer::Peer;
pub use protocol::membership::{Host, Network};
pub use protocol::message::kind;
pub use transport::connection::Connection;
