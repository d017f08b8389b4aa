use std::time::Duration;

use crate::error::Result;
use crate::protocol::packet;
use crate::stream::{ByteSource, Stream};

/// The connection-side state the result-set decoder borrows: the byte
/// source, the running packet sequence number and the read timeout.
///
/// Session management (handshake, authentication, query submission)
/// lives in the layer above; this type only owns what packet reading
/// needs.
pub struct Conn<S: ByteSource = Stream> {
    pub(crate) stream: S,
    /// Next expected MySQL packet sequence number, wrapping mod 256.
    pub next_seq_id: u8,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) closed: bool,
}

impl<S: ByteSource> Conn<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            next_seq_id: 0,
            read_timeout: None,
            closed: false,
        }
    }

    pub fn with_read_timeout(stream: S, read_timeout: Option<Duration>) -> Self {
        Self {
            stream,
            next_seq_id: 0,
            read_timeout,
            closed: false,
        }
    }

    pub fn set_read_timeout(&mut self, read_timeout: Option<Duration>) {
        self.read_timeout = read_timeout;
    }

    /// Read one logical packet payload, advancing `next_seq_id`.
    pub fn read_packet(&mut self, payload: &mut Vec<u8>) -> Result<()> {
        let mut seq = self.next_seq_id;
        let result = packet::read_packet(self, &mut seq, payload);
        self.next_seq_id = seq;
        result
    }

    /// Tear the transport down. Idempotent.
    pub fn force_close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stream.close();
        }
    }

    /// True once the connection has been force-closed by an error.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::PacketHeader;
    use zerocopy::IntoBytes;

    #[test]
    fn read_packet_advances_the_sequence_counter() {
        let mut wire = PacketHeader::encode(3, 0).as_bytes().to_vec();
        wire.extend_from_slice(b"abc");
        let mut conn = Conn::new(std::io::Cursor::new(wire));

        let mut payload = Vec::new();
        conn.read_packet(&mut payload).unwrap();
        assert_eq!(payload, b"abc");
        assert_eq!(conn.next_seq_id, 1);
        assert!(!conn.is_closed());
    }

    #[test]
    fn force_close_is_idempotent() {
        let mut conn = Conn::new(std::io::Cursor::new(Vec::new()));
        conn.force_close();
        conn.force_close();
        assert!(conn.is_closed());
    }
}
