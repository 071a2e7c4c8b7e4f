//! Framing round-trip over real TCP streams.
//!
//! The receiver must decode exactly the envelopes that were sent, in
//! order, regardless of how the bytes were batched on the wire, including
//! content that contains characters resembling the delimiter.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite};

use net_peer::core::codec::EnvelopeCodec;
use net_peer::{Envelope, PeerError};

fn tricky_envelope(n: usize) -> Envelope {
    Envelope::new(
        "framer",
        "burst",
        json!({
            "n": n,
            "newline": "before\nafter",
            "crlf": "a\r\nb",
            "escaped": "literal \\n backslash-n",
        }),
    )
}

#[tokio::test]
async fn n_envelopes_back_to_back_arrive_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let n = 50;
    let sender = tokio::spawn(async move {
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut framed = FramedWrite::new(stream, EnvelopeCodec::default());
        for i in 0..n {
            framed.send(tricky_envelope(i)).await.unwrap();
        }
        framed.into_inner().shutdown().await.unwrap();
    });

    let (stream, _) = listener.accept().await.unwrap();
    let mut framed = FramedRead::new(stream, EnvelopeCodec::default());

    let mut received = Vec::new();
    while let Some(frame) = framed.next().await {
        received.push(frame.unwrap());
    }
    sender.await.unwrap();

    assert_eq!(received.len(), n);
    for (i, envelope) in received.iter().enumerate() {
        assert_eq!(*envelope, tricky_envelope(i), "envelope {i} differs");
    }
}

#[tokio::test]
async fn frames_split_across_arbitrary_chunks_decode() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Serialize three frames into one buffer, then dribble it out in
    // 7-byte chunks so every frame straddles several reads.
    let mut wire = Vec::new();
    for i in 0..3 {
        wire.extend_from_slice(&serde_json::to_vec(&tricky_envelope(i)).unwrap());
        wire.push(b'\n');
    }

    let sender = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        for chunk in wire.chunks(7) {
            stream.write_all(chunk).await.unwrap();
            stream.flush().await.unwrap();
        }
        stream.shutdown().await.unwrap();
    });

    let (stream, _) = listener.accept().await.unwrap();
    let mut framed = FramedRead::new(stream, EnvelopeCodec::default());

    let mut received = Vec::new();
    while let Some(frame) = framed.next().await {
        received.push(frame.unwrap());
    }
    sender.await.unwrap();

    assert_eq!(received.len(), 3);
    for (i, envelope) in received.iter().enumerate() {
        assert_eq!(*envelope, tricky_envelope(i));
    }
}

#[tokio::test]
async fn malformed_record_is_fatal_for_the_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let sender = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"this is not json\n").await.unwrap();
        stream.shutdown().await.unwrap();
    });

    let (stream, _) = listener.accept().await.unwrap();
    let mut framed = FramedRead::new(stream, EnvelopeCodec::default());

    let result = framed.next().await.expect("one frame result");
    assert!(matches!(result, Err(PeerError::MalformedFrame(_))));
    sender.await.unwrap();
}

#[tokio::test]
async fn undelimited_flood_is_rejected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let sender = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        // 1 KiB of bytes with no delimiter against a 256-byte frame limit.
        stream.write_all(&[b'x'; 1024]).await.unwrap();
        stream.shutdown().await.unwrap();
    });

    let (stream, _) = listener.accept().await.unwrap();
    let mut framed = FramedRead::new(stream, EnvelopeCodec::new(256));

    let result = framed.next().await.expect("one frame result");
    assert!(matches!(result, Err(PeerError::OversizedFrame(_))));
    sender.await.unwrap();
}
