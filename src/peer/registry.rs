//! Bookkeeping for live connections and known hosts.

use std::net::IpAddr;

use crate::protocol::membership::Host;
use crate::transport::connection::Connection;

/// The set of live sockets this process holds and the set of known remote
/// hosts, kept consistent with each other. Owned exclusively by the engine
/// and only ever touched under its lock.
#[derive(Default)]
pub(crate) struct Registry {
    connections: Vec<Connection>,
    hosts: Vec<Host>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connection(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Remove a connection by id. Idempotent: returns whether the
    /// connection was still present, so close and end events routed here
    /// twice cannot double-count one logical disconnect.
    pub fn remove_connection(&mut self, id: u64) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.id() != id);
        self.connections.len() != before
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.connections.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Insert a host unless one with the same `(ip, main_port)` already
    /// exists; duplicate inserts are a no-op.
    pub fn add_host(&mut self, host: Host) -> bool {
        if self.hosts.iter().any(|h| h.same_endpoint(&host)) {
            return false;
        }
        self.hosts.push(host);
        true
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn hosts_snapshot(&self) -> Vec<Host> {
        self.hosts.clone()
    }

    pub fn find_host_mut<P>(&mut self, predicate: P) -> Option<&mut Host>
    where
        P: Fn(&Host) -> bool,
    {
        self.hosts.iter_mut().find(|h| predicate(h))
    }

    /// Remove the host matching a disconnecting socket: same remote IP,
    /// and the socket's remote port is either the port observed when the
    /// host connected or its advertised listening port (a host may be
    /// known by either, depending on which side dialed).
    pub fn remove_host_for_socket(&mut self, ip: IpAddr, port: u16) -> Option<Host> {
        let index = self
            .hosts
            .iter()
            .position(|h| h.ip == ip && (h.remote_port == port || h.main_port == port))?;
        Some(self.hosts.remove(index))
    }

    pub fn clear(&mut self) {
        self.connections.clear();
        self.hosts.clear();
    }
}
