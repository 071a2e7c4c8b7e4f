//! Host/network model and the set logic behind mesh convergence.
//!
//! Kept free of sockets so the join algorithm's reconciliation rules can be
//! tested on plain values.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;

/// A remote member as known to the local process.
///
/// `remote_port` is the port observed on the socket to or from that host;
/// `main_port` is the host's own listening port, the stable rendezvous
/// address. `name` stays empty until the host introduces itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    #[serde(default)]
    pub name: String,
    pub ip: IpAddr,
    pub remote_port: u16,
    pub main_port: u16,
}

impl Host {
    /// Stable rendezvous identity: two Hosts are the same member when they
    /// share `(ip, main_port)`.
    pub fn same_endpoint(&self, other: &Host) -> bool {
        self.ip == other.ip && self.main_port == other.main_port
    }
}

/// The process-local view of the overlay: every currently-reachable member
/// plus the shared application state. Also the body of a
/// NETWORK_INFORMATION snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub hosts: Vec<Host>,
    pub state: Value,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            state: Value::Null,
        }
    }
}

/// Hosts from a received snapshot that still need to be dialed: everyone
/// the snapshot names that the local process does not already know by
/// `(ip, main_port)`.
pub fn reconcile(known: &[Host], snapshot: &[Host]) -> Vec<Host> {
    snapshot
        .iter()
        .filter(|candidate| !known.iter().any(|h| h.same_endpoint(candidate)))
        .cloned()
        .collect()
}

/// Whether `candidate` collides with the local process's own name or with
/// any host already known. Empty host names (handshake not finished) never
/// collide.
pub fn name_in_use(own_name: &str, hosts: &[Host], candidate: &str) -> bool {
    if candidate == own_name {
        return true;
    }
    hosts.iter().any(|h| !h.name.is_empty() && h.name == candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str, ip: &str, main_port: u16) -> Host {
        Host {
            name: name.to_string(),
            ip: ip.parse().expect("valid ip"),
            remote_port: 50_000,
            main_port,
        }
    }

    #[test]
    fn reconcile_returns_only_unknown_hosts() {
        let known = vec![host("a", "127.0.0.1", 4000), host("b", "127.0.0.1", 4001)];
        let snapshot = vec![
            host("a", "127.0.0.1", 4000),
            host("c", "127.0.0.1", 4002),
            host("d", "10.0.0.7", 4000),
        ];

        let to_dial = reconcile(&known, &snapshot);
        assert_eq!(to_dial.len(), 2);
        assert_eq!(to_dial[0].name, "c");
        assert_eq!(to_dial[1].name, "d");
    }

    #[test]
    fn reconcile_matches_by_endpoint_not_name() {
        // The locally-known entry has no name yet (handshake pending), but
        // the endpoint already matches: nothing to dial.
        let known = vec![host("", "127.0.0.1", 4000)];
        let snapshot = vec![host("a", "127.0.0.1", 4000)];
        assert!(reconcile(&known, &snapshot).is_empty());
    }

    #[test]
    fn reconcile_of_empty_snapshot_is_empty() {
        let known = vec![host("a", "127.0.0.1", 4000)];
        assert!(reconcile(&known, &[]).is_empty());
    }

    #[test]
    fn name_collision_includes_own_name() {
        assert!(name_in_use("me", &[], "me"));
        assert!(!name_in_use("me", &[], "you"));
    }

    #[test]
    fn name_collision_scans_known_hosts() {
        let hosts = vec![host("a", "127.0.0.1", 4000), host("", "127.0.0.1", 4001)];
        assert!(name_in_use("me", &hosts, "a"));
        // An empty host name means the handshake has not finished; it must
        // never collide with anything.
        assert!(!name_in_use("me", &hosts, ""));
    }

    #[test]
    fn host_serializes_with_wire_field_names() {
        let h = host("a", "127.0.0.1", 4000);
        let wire = serde_json::to_string(&h).expect("serialize");
        assert!(wire.contains("\"remotePort\":50000"));
        assert!(wire.contains("\"mainPort\":4000"));
        assert!(wire.contains("\"ip\":\"127.0.0.1\""));
    }

    #[test]
    fn host_deserializes_without_name() {
        let h: Host = serde_json::from_str(
            r#"{"ip":"127.0.0.1","remotePort":51000,"mainPort":4000}"#,
        )
        .expect("deserialize");
        assert!(h.name.is_empty());
    }
}
