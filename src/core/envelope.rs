//! The typed envelope every wire record decodes to.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The unit of wire exchange between peers.
///
/// `kind` is either one of the reserved control kinds (see
/// [`crate::protocol::message`]) or an application-chosen string; `content`
/// is opaque to the engine for application kinds. The engine is the sole
/// authority for `sender_name` on the wire: every outbound envelope is
/// signed with the sending process's own name, overwriting any
/// caller-supplied value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Name of the process that sent this envelope.
    pub sender_name: String,

    /// Message kind: a reserved control kind or an application string.
    #[serde(rename = "type")]
    pub kind: String,

    /// Payload; structure depends on `kind`.
    pub content: Value,
}

impl Envelope {
    /// Build an envelope. Callers inside the engine sign it with the
    /// process name before it hits the wire.
    pub fn new(sender_name: impl Into<String>, kind: impl Into<String>, content: Value) -> Self {
        Self {
            sender_name: sender_name.into(),
            kind: kind.into(),
            content,
        }
    }
}
