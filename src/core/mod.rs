//! # Core Wire Components
//!
//! Low-level message framing over byte streams.
//!
//! This module provides the foundation for peer exchange: the envelope wire
//! unit and the codec that turns a TCP byte stream into a sequence of
//! discrete, complete envelopes.
//!
//! ## Wire Format
//! ```text
//! {"senderName":"...","type":"...","content":...}\n
//! ```
//!
//! One JSON record per line. JSON string escaping guarantees that the
//! line-feed delimiter never appears inside a serialized record.
//!
//! ## Safety
//! - Maximum frame size of 16 MB (prevents memory exhaustion by a peer
//!   that withholds the delimiter)
//! - Malformed records are connection-fatal, never silently skipped

pub mod codec;
pub mod envelope;
