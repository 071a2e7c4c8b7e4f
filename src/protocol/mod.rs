//! # Membership Protocol
//!
//! The typed control surface peers use to form the mesh.
//!
//! ## Components
//! - **Message**: reserved control kinds and their payloads
//! - **Membership**: host/network model and the socket-free set logic the
//!   join algorithm is built on
//!
//! ## Join flow
//! A joining peer connects to one member and carries a need-flag in its
//! PRESENTATION. The member answers with NETWORK_INFORMATION (its entire
//! host set plus current shared state); the joiner then dials every host
//! in that snapshot, one at a time, and only after the last dial settles
//! adopts the state and announces itself converged.

pub mod membership;
pub mod message;
