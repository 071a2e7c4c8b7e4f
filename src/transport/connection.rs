//! Live socket handles and their I/O tasks.

use futures::SinkExt;
use std::io;
use std::net::SocketAddr;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::debug;

use crate::core::codec::EnvelopeCodec;
use crate::core::envelope::Envelope;

/// A live bidirectional socket to a remote process.
///
/// Cloneable handle; the underlying reader/writer tasks are owned by the
/// engine. Sends are fire-and-forget: once the writer has gone away (the
/// socket is half-closed or torn down) a send is silently dropped, never
/// an error.
#[derive(Debug, Clone)]
pub struct Connection {
    id: u64,
    remote_addr: SocketAddr,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl Connection {
    /// Process-unique identifier for registry bookkeeping.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote endpoint of the socket. For an outbound connection the port
    /// is the peer's listening port; for an inbound one it is the peer's
    /// ephemeral port.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Queue an envelope for the writer task.
    pub(crate) fn send(&self, envelope: Envelope) {
        // Writer gone means the socket is closing; dropping the frame is
        // the contract here.
        let _ = self.outbound.send(envelope);
    }
}

/// Frame source half of an established connection, driven by the engine's
/// read loop.
pub(crate) type FrameReader = FramedRead<OwnedReadHalf, EnvelopeCodec>;

pub(crate) struct ConnectionParts {
    pub connection: Connection,
    pub reader: FrameReader,
    pub writer_task: JoinHandle<()>,
}

/// Split a stream into a framed reader and a mailbox-driven writer task.
///
/// The writer drains its mailbox until every [`Connection`] clone is gone,
/// so frames queued right before teardown (a CONNECTION_CLOSED rejection,
/// say) still reach the wire before the write half drops.
pub(crate) fn establish(
    stream: TcpStream,
    id: u64,
    max_frame_size: usize,
) -> io::Result<ConnectionParts> {
    let remote_addr = stream.peer_addr()?;
    let (read_half, write_half) = stream.into_split();

    let reader = FramedRead::new(read_half, EnvelopeCodec::new(max_frame_size));
    let mut writer = FramedWrite::new(write_half, EnvelopeCodec::new(max_frame_size));

    let (outbound, mut mailbox) = mpsc::unbounded_channel::<Envelope>();

    let writer_task = tokio::spawn(async move {
        while let Some(envelope) = mailbox.recv().await {
            if let Err(e) = writer.send(envelope).await {
                debug!(peer = %remote_addr, error = %e, "Write failed, closing outbound half");
                break;
            }
        }
    });

    Ok(ConnectionParts {
        connection: Connection {
            id,
            remote_addr,
            outbound,
        },
        reader,
        writer_task,
    })
}
