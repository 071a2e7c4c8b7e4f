//! Tokio codec framing envelopes over a byte stream.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_FRAME_SIZE;
use crate::core::envelope::Envelope;
use crate::error::PeerError;

/// Newline-delimited JSON codec for [`Envelope`] frames.
///
/// Encoding serializes the envelope and appends a single line-feed byte;
/// JSON string escaping guarantees the delimiter cannot occur inside a
/// record. Decoding accumulates bytes and yields one envelope per complete
/// line, in arrival order; a trailing partial line is retained and prefixed
/// to the next chunk. Empty lines are discarded.
///
/// A malformed line is an error; the connection it arrived on must be
/// dropped rather than the record silently skipped.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    max_frame_size: usize,
}

impl EnvelopeCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = PeerError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>, PeerError> {
        loop {
            let Some(pos) = src.iter().position(|&b| b == b'\n') else {
                // No complete line yet. A partial line beyond the frame
                // limit means the peer is never going to delimit it.
                if src.len() > self.max_frame_size {
                    return Err(PeerError::OversizedFrame(src.len()));
                }
                return Ok(None);
            };

            if pos > self.max_frame_size {
                return Err(PeerError::OversizedFrame(pos));
            }

            let line = src.split_to(pos + 1);
            // Strip the delimiter and any carriage return preceding it.
            let mut segment = &line[..pos];
            if segment.ends_with(b"\r") {
                segment = &segment[..segment.len() - 1];
            }

            if segment.is_empty() {
                continue;
            }

            return serde_json::from_slice::<Envelope>(segment)
                .map(Some)
                .map_err(|e| PeerError::MalformedFrame(e.to_string()));
        }
    }
}

impl Encoder<Envelope> for EnvelopeCodec {
    type Error = PeerError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), PeerError> {
        let payload = serde_json::to_vec(&item)?;
        if payload.len() > self.max_frame_size {
            return Err(PeerError::OversizedFrame(payload.len()));
        }

        dst.reserve(payload.len() + 1);
        dst.put_slice(&payload);
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(n: usize) -> Envelope {
        Envelope::new("tester", "seq", json!({ "n": n, "text": "line one\nline two" }))
    }

    #[test]
    fn encode_appends_single_delimiter() {
        let mut codec = EnvelopeCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(envelope(0), &mut buf).unwrap();

        assert_eq!(buf.last(), Some(&b'\n'));
        // The line feed inside the content string must be escaped, so the
        // only raw delimiter is the trailing one.
        assert_eq!(buf.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn back_to_back_frames_decode_in_order() {
        let mut codec = EnvelopeCodec::default();
        let mut buf = BytesMut::new();
        for n in 0..5 {
            codec.encode(envelope(n), &mut buf).unwrap();
        }

        for n in 0..5 {
            let decoded = codec.decode(&mut buf).unwrap().expect("frame present");
            assert_eq!(decoded, envelope(n));
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn partial_frame_is_retained_across_chunks() {
        let mut codec = EnvelopeCodec::default();
        let mut wire = BytesMut::new();
        codec.encode(envelope(7), &mut wire).unwrap();

        let (first, second) = wire.split_at(wire.len() / 2);
        let mut buf = BytesMut::from(first);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(second);
        let decoded = codec.decode(&mut buf).unwrap().expect("frame complete");
        assert_eq!(decoded, envelope(7));
    }

    #[test]
    fn empty_segments_are_discarded() {
        let mut codec = EnvelopeCodec::default();
        let mut buf = BytesMut::new();
        buf.put_slice(b"\n\r\n");
        codec.encode(envelope(1), &mut buf).unwrap();
        buf.put_slice(b"\n");

        let decoded = codec.decode(&mut buf).unwrap().expect("real frame after blanks");
        assert_eq!(decoded, envelope(1));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn crlf_delimited_frames_decode() {
        let mut codec = EnvelopeCodec::default();
        let json = serde_json::to_vec(&envelope(3)).unwrap();
        let mut buf = BytesMut::new();
        buf.put_slice(&json);
        buf.put_slice(b"\r\n");

        let decoded = codec.decode(&mut buf).unwrap().expect("frame present");
        assert_eq!(decoded, envelope(3));
    }

    #[test]
    fn malformed_line_is_an_error() {
        let mut codec = EnvelopeCodec::default();
        let mut buf = BytesMut::from(&b"{not json}\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(PeerError::MalformedFrame(_))
        ));
    }

    #[test]
    fn oversized_partial_is_rejected() {
        let mut codec = EnvelopeCodec::new(64);
        let mut buf = BytesMut::from(vec![b'a'; 65].as_slice());
        assert!(matches!(
            codec.decode(&mut buf),
            Err(PeerError::OversizedFrame(65))
        ));
    }

    #[test]
    fn oversized_encode_is_rejected() {
        let mut codec = EnvelopeCodec::new(32);
        let mut buf = BytesMut::new();
        let big = Envelope::new("tester", "blob", json!("x".repeat(64)));
        assert!(matches!(
            codec.encode(big, &mut buf),
            Err(PeerError::OversizedFrame(_))
        ));
    }
}
