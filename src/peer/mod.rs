//! # Membership Engine
//!
//! The central component: opens a listening endpoint, initiates outbound
//! connections, runs the join handshake, converges to full mesh, keeps the
//! shared state, relays/broadcasts, and dispatches callbacks.
//!
//! ## Lifecycle
//! A process creates a [`Peer`] with a unique name and an initial shared
//! state, then either [`Peer::listen`]s (founding a new network) or
//! [`Peer::connect`]s to any existing member. The joining side carries a
//! need-flag in its PRESENTATION; the member answers with a full snapshot,
//! and the joiner dials every host in it, one at a time, before adopting
//! the state and firing the enter-network callback.
//!
//! ## Threading
//! Engine state (hosts, connections, shared state) lives behind plain
//! mutexes that are only taken from synchronous sections and never held
//! across an await. The one deliberate ordering point is the dialer
//! mailbox: join snapshots are processed by a single worker, one at a
//! time, so overlapping gossip cannot interleave connect attempts.

mod callbacks;
mod registry;

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PeerConfig;
use crate::core::envelope::Envelope;
use crate::error::{constants, PeerError, Result};
use crate::protocol::membership::{self, Host, Network};
use crate::protocol::message::{kind, ConnectionClosed, NetworkInformation, Presentation};
use crate::transport::connection::{self, Connection, FrameReader};

use callbacks::Callbacks;
use registry::Registry;

/// A member of the overlay network.
///
/// Cloning is cheap and hands out another handle to the same engine.
#[derive(Clone)]
pub struct Peer {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    config: PeerConfig,
    /// Bound listening port; zero until `listen` succeeds.
    listen_port: AtomicU16,
    next_connection_id: AtomicU64,
    /// Serializes the control-message switch and disconnect bookkeeping
    /// across reader tasks, preserving the one-logical-thread model the
    /// protocol assumes: a handshake runs to completion before the next
    /// socket event is handled. Never held across an await.
    events: Mutex<()>,
    registry: Mutex<Registry>,
    state: Mutex<Value>,
    callbacks: Callbacks,
    /// Guards the bind so a concurrent implicit listen cannot double-bind.
    endpoint: tokio::sync::Mutex<Option<u16>>,
    dialer: Mutex<Option<mpsc::UnboundedSender<Network>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Peer {
    /// Create a peer with a process-unique name and the initial shared
    /// state. The founding member's state is authoritative until a later
    /// join overwrites it.
    pub fn new(name: impl Into<String>, initial_state: Value) -> Self {
        Self::with_config(name, initial_state, PeerConfig::default())
    }

    pub fn with_config(name: impl Into<String>, initial_state: Value, config: PeerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                config,
                listen_port: AtomicU16::new(0),
                next_connection_id: AtomicU64::new(0),
                events: Mutex::new(()),
                registry: Mutex::new(Registry::new()),
                state: Mutex::new(initial_state),
                callbacks: Callbacks::default(),
                endpoint: tokio::sync::Mutex::new(None),
                dialer: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Bound listening port, or zero if this peer is not listening yet.
    pub fn port(&self) -> u16 {
        self.shared.listen_port.load(Ordering::SeqCst)
    }

    /// Current shared state (point-in-time copy).
    pub fn get_state(&self) -> Value {
        self.lock_state().clone()
    }

    /// Replace the shared state. Subsequent snapshots sent to joiners use
    /// this value.
    pub fn set_state(&self, state: Value) {
        *self.lock_state() = state;
    }

    /// Hosts currently known to this peer (point-in-time copy).
    pub fn hosts(&self) -> Vec<Host> {
        self.lock_registry().hosts_snapshot()
    }

    /// This peer's view of the overlay: host set plus shared state.
    pub fn network(&self) -> Network {
        let hosts = self.lock_registry().hosts_snapshot();
        Network {
            hosts,
            state: self.get_state(),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.lock_registry().connection_count()
    }

    /// Called every time this peer receives (and accepts) a connection.
    pub fn on_receive_connection<F>(&self, callback: F)
    where
        F: Fn(&str, &Connection) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_receive_connection(Arc::new(callback));
    }

    /// Called once the join handshake has converged: this peer holds a
    /// connection to every member it was told about and has adopted the
    /// network's shared state.
    pub fn on_enter_network<F>(&self, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_enter_network(Arc::new(callback));
    }

    /// Called once per removed host when a connection closes.
    pub fn on_disconnect<F>(&self, callback: F)
    where
        F: Fn(&Host, &Connection) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_disconnect(Arc::new(callback));
    }

    /// Called for every decoded envelope, control messages included.
    pub fn on_data<F>(&self, callback: F)
    where
        F: Fn(&Envelope, &Connection) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_data(Arc::new(callback));
    }

    /// Open the listening endpoint. Port zero requests an OS-assigned
    /// ephemeral port; the bound port is returned either way. Binding
    /// failures surface to the caller and are not retried.
    pub async fn listen(&self, port: u16) -> Result<u16> {
        let mut endpoint = self.shared.endpoint.lock().await;
        if let Some(bound) = *endpoint {
            return Err(PeerError::AlreadyListening(bound));
        }
        let bound = self.bind(port).await?;
        *endpoint = Some(bound);
        Ok(bound)
    }

    async fn ensure_listening(&self) -> Result<()> {
        let mut endpoint = self.shared.endpoint.lock().await;
        if endpoint.is_none() {
            *endpoint = Some(self.bind(0).await?);
        }
        Ok(())
    }

    async fn bind(&self, port: u16) -> Result<u16> {
        let listener =
            TcpListener::bind((self.shared.config.bind_address.as_str(), port)).await?;
        let bound = listener.local_addr()?.port();
        self.shared.listen_port.store(bound, Ordering::SeqCst);
        self.start_dialer();

        info!(name = %self.shared.name, port = bound, "Listening for peer connections");

        let peer = self.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!(peer = %addr, "Inbound connection");
                        // No proactive handshake: the inbound side waits
                        // for the remote's PRESENTATION.
                        if let Err(e) = peer.register_connection(stream) {
                            warn!(peer = %addr, error = %e, "Failed to register inbound connection");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        });
        self.track(accept_task);

        Ok(bound)
    }

    /// Connect to a member of an existing network using the configured
    /// timeout (a liveness bound on the TCP connect phase only).
    pub async fn connect(&self, host: &str, port: u16) -> Result<()> {
        self.connect_with_timeout(host, port, self.shared.config.connect_timeout)
            .await
    }

    /// Connect with an explicit timeout. If this peer has no listening
    /// endpoint yet, one is opened first so other members can dial back.
    /// On timeout the pending socket is dropped before the error surfaces.
    pub async fn connect_with_timeout(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<()> {
        self.ensure_listening().await?;

        let stream = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(PeerError::ConnectTimeout),
        };
        let remote = stream.peer_addr()?;

        // A first-ever connection means this peer is joining: ask the
        // member for the network snapshot. The flag is computed before the
        // host is recorded and is false on every later connection, so a
        // growing mesh never re-requests snapshots.
        let need_network_information = {
            let mut reg = self.lock_registry();
            let need = reg.hosts().is_empty();
            reg.add_host(Host {
                name: String::new(),
                ip: remote.ip(),
                remote_port: remote.port(),
                main_port: port,
            });
            need
        };

        let connection = match self.register_connection(stream) {
            Ok(connection) => connection,
            Err(e) => {
                // Roll the provisional host back; a host without a
                // connection would never be cleaned up.
                self.lock_registry()
                    .remove_host_for_socket(remote.ip(), remote.port());
                return Err(e);
            }
        };
        debug!(peer = %remote, need_network_information, "Outbound connection established");

        let presentation = Presentation {
            listen_port: self.port(),
            need_network_information,
        }
        .into_envelope(&self.shared.name)?;
        connection.send(presentation);

        Ok(())
    }

    /// Send an envelope of the given kind to every live connection. The
    /// sender never receives its own broadcast: a process holds no
    /// connection to itself.
    pub fn broadcast(&self, data_kind: &str, content: Value) {
        let envelope = Envelope::new(self.shared.name.clone(), data_kind, content);
        let connections = self.lock_registry().connections();
        debug!(kind = data_kind, connections = connections.len(), "Broadcasting");
        for connection in &connections {
            connection.send(envelope.clone());
        }
    }

    /// Send an envelope of the given kind to a single connection,
    /// fire-and-forget.
    pub fn send_data(&self, connection: &Connection, data_kind: &str, content: Value) {
        connection.send(Envelope::new(self.shared.name.clone(), data_kind, content));
    }

    /// Tear this peer down: stop accepting, stop dialing, and drop every
    /// socket so remote members observe EOF and run their normal
    /// disconnect cleanup. Terminal; the peer cannot be reused afterwards.
    pub fn shutdown(&self) {
        info!(name = %self.shared.name, "Shutting down peer");
        *self.lock_dialer() = None;
        let tasks = std::mem::take(&mut *self.lock_tasks());
        for task in tasks {
            task.abort();
        }
        self.lock_registry().clear();
    }

    // ---- socket lifecycle -------------------------------------------------

    fn register_connection(&self, stream: TcpStream) -> Result<Connection> {
        let id = self.shared.next_connection_id.fetch_add(1, Ordering::SeqCst);
        let parts = connection::establish(stream, id, self.shared.config.max_frame_size)?;

        self.lock_registry().add_connection(parts.connection.clone());
        self.track(parts.writer_task);

        let peer = self.clone();
        let conn = parts.connection.clone();
        let reader_task = tokio::spawn(read_loop(peer, conn, parts.reader));
        self.track(reader_task);

        Ok(parts.connection)
    }

    /// Route a decoded envelope: the control-message switch first, then,
    /// unconditionally, the application's data callback.
    fn handle_envelope(&self, conn: &Connection, envelope: Envelope) -> ControlFlow<()> {
        let _events = self.lock_events();

        let flow = match envelope.kind.as_str() {
            kind::PRESENTATION => self.receive_presentation(conn, &envelope),
            kind::CONNECTION_CLOSED => {
                let reason = ConnectionClosed::from_content(&envelope.content)
                    .map(|c| c.message)
                    .unwrap_or_else(|_| "no reason given".to_string());
                warn!(peer = %conn.remote_addr(), reason, "Remote closed the connection");
                ControlFlow::Break(())
            }
            kind::NETWORK_INFORMATION => self.receive_network_information(conn, &envelope),
            kind::REQUEST_NETWORK_INFORMATION => {
                self.send_network_information(conn);
                ControlFlow::Continue(())
            }
            _ => ControlFlow::Continue(()),
        };

        self.shared.callbacks.data(&envelope, conn);
        flow
    }

    /// The join/introduction handshake, receiving side.
    fn receive_presentation(&self, conn: &Connection, envelope: &Envelope) -> ControlFlow<()> {
        let presentation = match Presentation::from_content(&envelope.content) {
            Ok(p) => p,
            Err(e) => {
                warn!(peer = %conn.remote_addr(), error = %e, "Malformed PRESENTATION, dropping connection");
                return ControlFlow::Break(());
            }
        };
        let sender = envelope.sender_name.as_str();
        let remote = conn.remote_addr();

        {
            let mut reg = self.lock_registry();

            // A nameless host at this address and listening port means this
            // is the answering half of a handshake we initiated: learn the
            // name, nothing to re-register.
            if let Some(host) = reg.find_host_mut(|h| {
                h.ip == remote.ip() && h.main_port == presentation.listen_port && h.name.is_empty()
            }) {
                host.name = sender.to_string();
                debug!(peer = sender, "Handshake answered");
                return ControlFlow::Continue(());
            }

            // Identity uniqueness is enforced here, unilaterally: the
            // offending peer gets a reason and loses this one connection.
            if membership::name_in_use(&self.shared.name, reg.hosts(), sender) {
                drop(reg);
                warn!(peer = sender, "Rejecting connection: name already in use");
                if let Ok(closed) = (ConnectionClosed {
                    message: constants::ERR_NICKNAME_IN_USE.to_string(),
                })
                .into_envelope(&self.shared.name)
                {
                    conn.send(closed);
                }
                return ControlFlow::Break(());
            }
        }

        // Notify before registering; the snapshot sent below must be the
        // pre-registration view (the new member already knows itself).
        self.shared.callbacks.receive_connection(sender, conn);

        match (Presentation {
            listen_port: self.port(),
            // Always false in a reply, so a presentation exchange cannot loop.
            need_network_information: false,
        })
        .into_envelope(&self.shared.name)
        {
            Ok(reply) => conn.send(reply),
            Err(e) => {
                error!(error = %e, "Failed to encode presentation reply");
                return ControlFlow::Break(());
            }
        }

        if presentation.need_network_information {
            self.send_network_information(conn);
        }

        self.lock_registry().add_host(Host {
            name: sender.to_string(),
            ip: remote.ip(),
            remote_port: remote.port(),
            main_port: presentation.listen_port,
        });
        info!(peer = sender, "Peer joined");

        ControlFlow::Continue(())
    }

    fn receive_network_information(&self, conn: &Connection, envelope: &Envelope) -> ControlFlow<()> {
        let info = match NetworkInformation::from_content(&envelope.content) {
            Ok(info) => info,
            Err(e) => {
                warn!(peer = %conn.remote_addr(), error = %e, "Malformed NETWORK_INFORMATION, dropping connection");
                return ControlFlow::Break(());
            }
        };

        debug!(
            from = %envelope.sender_name,
            hosts = info.network.hosts.len(),
            "Received network snapshot"
        );

        // Hand the snapshot to the dialer mailbox; overlapping snapshots
        // queue behind each other instead of interleaving dials.
        if let Some(dialer) = self.lock_dialer().clone() {
            let _ = dialer.send(info.network);
        }
        ControlFlow::Continue(())
    }

    fn send_network_information(&self, conn: &Connection) {
        let network = self.network();
        match (NetworkInformation { network }).into_envelope(&self.shared.name) {
            Ok(envelope) => conn.send(envelope),
            Err(e) => error!(error = %e, "Failed to encode network snapshot"),
        }
    }

    fn start_dialer(&self) {
        let mut slot = self.lock_dialer();
        if slot.is_some() {
            return;
        }
        let (tx, mut rx) = mpsc::unbounded_channel::<Network>();
        *slot = Some(tx);
        drop(slot);

        let peer = self.clone();
        let worker = tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                if let Err(e) = peer.join_network(snapshot).await {
                    error!(error = %e, "Join aborted before convergence");
                }
            }
        });
        self.track(worker);
    }

    /// Converge on a received snapshot: dial every host in it that is not
    /// already known, strictly one at a time, then adopt the shared state
    /// and announce entry. Convergence is "connect to everyone you were
    /// told about, then and only then announce yourself ready".
    async fn join_network(&self, snapshot: Network) -> Result<()> {
        let to_dial = {
            let reg = self.lock_registry();
            membership::reconcile(reg.hosts(), &snapshot.hosts)
        };

        for host in to_dial {
            // An inbound handshake may have raced this dial; recheck
            // against the registry before connecting.
            let already_known = {
                let reg = self.lock_registry();
                reg.hosts().iter().any(|h| h.same_endpoint(&host))
            };
            if already_known {
                continue;
            }

            self.connect(&host.ip.to_string(), host.main_port)
                .await
                .map_err(|e| {
                    PeerError::JoinError(format!(
                        "dialing {}:{} failed: {e}",
                        host.ip, host.main_port
                    ))
                })?;
        }

        self.set_state(snapshot.state.clone());
        info!(hosts = snapshot.hosts.len(), "Entered network");
        self.shared.callbacks.enter_network(&snapshot.state);
        Ok(())
    }

    /// Disconnect bookkeeping, shared by EOF, socket errors, and
    /// wire-fatal conditions. Idempotent: the first removal wins, so a
    /// socket surfacing both an error and a close cannot double-count.
    fn handle_disconnection(&self, conn: &Connection) {
        let _events = self.lock_events();
        let remote = conn.remote_addr();
        let removed_host = {
            let mut reg = self.lock_registry();
            if !reg.remove_connection(conn.id()) {
                return;
            }
            reg.remove_host_for_socket(remote.ip(), remote.port())
        };

        debug!(peer = %remote, "Connection closed");
        if let Some(host) = removed_host {
            info!(peer = %host.name, "Peer disconnected");
            self.shared.callbacks.disconnect(&host, conn);
        }
    }

    // ---- plumbing ---------------------------------------------------------

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.lock_tasks();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    fn lock_events(&self) -> MutexGuard<'_, ()> {
        self.shared
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.shared
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, Value> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_dialer(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Network>>> {
        self.shared
            .dialer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-connection read loop: frames go through the control switch; EOF and
/// wire errors end in the same disconnect handling.
async fn read_loop(peer: Peer, conn: Connection, mut reader: FrameReader) {
    while let Some(frame) = reader.next().await {
        match frame {
            Ok(envelope) => {
                if peer.handle_envelope(&conn, envelope).is_break() {
                    break;
                }
            }
            Err(e) => {
                // Malformed or oversized data is fatal for this connection
                // only; every other connection is unaffected.
                warn!(peer = %conn.remote_addr(), error = %e, "Dropping connection on wire error");
                break;
            }
        }
    }
    peer.handle_disconnection(&conn);
}
