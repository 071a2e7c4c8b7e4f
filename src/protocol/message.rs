//! Reserved control kinds and their payloads.
//!
//! Every other `type` string on the wire is application-defined and opaque
//! to the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::envelope::Envelope;
use crate::error::Result;
use crate::protocol::membership::Network;

/// Reserved `type` values used by the membership protocol.
pub mod kind {
    /// Sender announces its listening port and whether it needs a full
    /// network snapshot.
    pub const PRESENTATION: &str = "PRESENTATION";
    /// Sender is closing the logical connection, with a reason.
    pub const CONNECTION_CLOSED: &str = "CONNECTION_CLOSED";
    /// Full snapshot: every host known to the sender plus shared state.
    pub const NETWORK_INFORMATION: &str = "NETWORK_INFORMATION";
    /// Sender requests a NETWORK_INFORMATION reply.
    pub const REQUEST_NETWORK_INFORMATION: &str = "REQUEST_NETWORK_INFORMATION";
}

/// Whether a kind string is reserved for the membership protocol.
pub fn is_reserved(kind_str: &str) -> bool {
    matches!(
        kind_str,
        kind::PRESENTATION
            | kind::CONNECTION_CLOSED
            | kind::NETWORK_INFORMATION
            | kind::REQUEST_NETWORK_INFORMATION
    )
}

/// PRESENTATION payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    /// The sender's own listening port, its stable rendezvous address.
    pub listen_port: u16,
    /// True only on a joiner's very first connection; replies always carry
    /// false so a presentation exchange cannot loop.
    pub need_network_information: bool,
}

impl Presentation {
    pub fn into_envelope(self, sender: &str) -> Result<Envelope> {
        Ok(Envelope::new(
            sender,
            kind::PRESENTATION,
            serde_json::to_value(self)?,
        ))
    }

    pub fn from_content(content: &Value) -> Result<Self> {
        Ok(serde_json::from_value(content.clone())?)
    }
}

/// CONNECTION_CLOSED payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionClosed {
    /// Human-readable reason, e.g. a duplicate-name rejection.
    pub message: String,
}

impl ConnectionClosed {
    pub fn into_envelope(self, sender: &str) -> Result<Envelope> {
        Ok(Envelope::new(
            sender,
            kind::CONNECTION_CLOSED,
            serde_json::to_value(self)?,
        ))
    }

    pub fn from_content(content: &Value) -> Result<Self> {
        Ok(serde_json::from_value(content.clone())?)
    }
}

/// NETWORK_INFORMATION payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInformation {
    pub network: Network,
}

impl NetworkInformation {
    pub fn into_envelope(self, sender: &str) -> Result<Envelope> {
        Ok(Envelope::new(
            sender,
            kind::NETWORK_INFORMATION,
            serde_json::to_value(self)?,
        ))
    }

    pub fn from_content(content: &Value) -> Result<Self> {
        Ok(serde_json::from_value(content.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn presentation_wire_shape() {
        let env = Presentation {
            listen_port: 4000,
            need_network_information: true,
        }
        .into_envelope("alice")
        .expect("envelope");

        assert_eq!(env.kind, kind::PRESENTATION);
        assert_eq!(
            env.content,
            json!({ "listenPort": 4000, "needNetworkInformation": true })
        );

        let back = Presentation::from_content(&env.content).expect("parse");
        assert_eq!(back.listen_port, 4000);
        assert!(back.need_network_information);
    }

    #[test]
    fn connection_closed_carries_reason() {
        let env = ConnectionClosed {
            message: crate::error::constants::ERR_NICKNAME_IN_USE.to_string(),
        }
        .into_envelope("alice")
        .expect("envelope");

        let back = ConnectionClosed::from_content(&env.content).expect("parse");
        assert_eq!(back.message, "Nickname is already being used.");
    }

    #[test]
    fn network_information_roundtrips_state() {
        let info = NetworkInformation {
            network: Network {
                hosts: Vec::new(),
                state: json!({ "round": 2 }),
            },
        };
        let env = info.clone().into_envelope("alice").expect("envelope");
        let back = NetworkInformation::from_content(&env.content).expect("parse");
        assert_eq!(back, info);
    }

    #[test]
    fn reserved_kind_detection() {
        assert!(is_reserved(kind::PRESENTATION));
        assert!(is_reserved(kind::REQUEST_NETWORK_INFORMATION));
        assert!(!is_reserved("chat-message"));
    }
}
