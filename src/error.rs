//! # Error Types
//!
//! Comprehensive error handling for the peer engine.
//!
//! This module defines all error variants that can occur during engine
//! operations, from low-level I/O failures to wire-level framing problems.
//!
//! ## Error Categories
//! - **I/O Errors**: bind, connect, and socket failures
//! - **Wire Errors**: malformed or oversized frames
//! - **Engine Errors**: lifecycle misuse, join failures
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Propagation Policy
//! Call-level problems (bind, connect, timeout) propagate to the immediate
//! caller as a failed operation. Handshake-level problems (name collision,
//! malformed data) are handled locally and never reach past the single
//! affected connection: a broken peer can only damage its own connection.

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Rejection reason sent to a peer whose name collides with a member
    /// already present in the network.
    pub const ERR_NICKNAME_IN_USE: &str = "Nickname is already being used.";

    /// Callback lock errors
    pub const ERR_CALLBACK_WRITE_LOCK: &str = "Failed to acquire write lock on callbacks";
    pub const ERR_CALLBACK_READ_LOCK: &str = "Failed to acquire read lock on callbacks";

    /// Wire validation errors
    pub const ERR_OVERSIZED_FRAME: &str = "Frame exceeds maximum size";
    pub const ERR_MALFORMED_FRAME: &str = "Malformed frame";
}

/// PeerError is the primary error type for all engine operations.
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Connection attempt timed out")]
    ConnectTimeout,

    #[error("Peer is already listening on port {0}")]
    AlreadyListening(u16),

    #[error("Connection closed by remote: {0}")]
    ConnectionClosed(String),

    #[error("Join failed: {0}")]
    JoinError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using PeerError
pub type Result<T> = std::result::Result<T, PeerError>;
