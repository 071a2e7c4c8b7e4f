//! # Transport
//!
//! Per-socket plumbing: the cloneable [`connection::Connection`] handle and
//! the reader/writer task pair that moves framed envelopes over a TCP
//! stream. No knowledge of membership semantics lives here; the engine
//! drives the frames this layer produces.

pub mod connection;
