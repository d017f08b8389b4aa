use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::conn::Conn;
use crate::error::{Error, Result};
use crate::stream::ByteSource;

/// Maximum payload carried by one physical packet; a payload of exactly
/// this length continues in the following packet.
pub const MAX_PAYLOAD_LENGTH: usize = 0xFF_FFFF;

pub(crate) const LOST_CONNECTION: &str = "Lost connection to SingleStoreDB server during query";

/// MySQL packet header (zero-copy)
///
/// Layout matches the wire protocol:
/// - length: 3 bytes (little-endian, payload length)
/// - sequence_id: 1 byte
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    pub fn encode(length: usize, sequence_id: u8) -> Self {
        let len = u32::to_le_bytes(length as u32);
        Self {
            length: [len[0], len[1], len[2]],
            sequence_id,
        }
    }

    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }
}

/// Read exactly `buf.len()` bytes from the connection's byte source.
///
/// The read timeout is re-applied before every read. Interrupted reads
/// (EINTR) retry transparently; any other failure, a timeout, or a
/// short read force-closes the connection and surfaces as a lost
/// connection.
pub fn read_bytes<S: ByteSource>(conn: &mut Conn<S>, buf: &mut [u8]) -> Result<()> {
    let timeout = conn.read_timeout;
    let mut filled = 0;
    while filled < buf.len() {
        if let Err(err) = conn.stream.set_read_timeout(timeout) {
            tracing::warn!(%err, "applying read timeout failed, closing connection");
            conn.force_close();
            return Err(Error::Operational(LOST_CONNECTION.to_string()));
        }
        match conn.stream.read(&mut buf[filled..]) {
            Ok(0) => {
                tracing::warn!("short read from server, closing connection");
                conn.force_close();
                return Err(Error::Operational(LOST_CONNECTION.to_string()));
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => {
                tracing::warn!(%err, "read failed, closing connection");
                conn.force_close();
                return Err(Error::Operational(LOST_CONNECTION.to_string()));
            }
        }
    }
    Ok(())
}

/// Read one logical packet payload, concatenating 16MB continuation
/// packets, and validate the sequence number of every physical packet.
///
/// `next_seq_id` advances mod 256 per physical packet. A mismatched
/// sequence number of 0 means the server hung up and reset; any other
/// mismatch is a protocol violation. Both force-close the connection.
pub fn read_packet<S: ByteSource>(
    conn: &mut Conn<S>,
    next_seq_id: &mut u8,
    payload: &mut Vec<u8>,
) -> Result<()> {
    payload.clear();
    loop {
        let mut header = PacketHeader::new_zeroed();
        read_bytes(conn, header.as_mut_bytes())?;

        if header.sequence_id != *next_seq_id {
            conn.force_close();
            return Err(if header.sequence_id == 0 {
                Error::Operational(LOST_CONNECTION.to_string())
            } else {
                Error::Internal("Packet sequence number wrong".to_string())
            });
        }
        *next_seq_id = next_seq_id.wrapping_add(1);

        let length = header.length();
        let start = payload.len();
        payload.resize(start + length, 0);
        read_bytes(conn, &mut payload[start..])?;

        if length < MAX_PAYLOAD_LENGTH {
            return Ok(());
        }
    }
}

/// A payload is an EOF packet iff its first byte is `0xFE` and it is
/// shorter than 9 bytes.
pub fn is_eof_packet(payload: &[u8]) -> bool {
    payload.first() == Some(&0xFE) && payload.len() < 9
}

/// A payload is a server error packet iff its first byte is `0xFF`.
pub fn is_err_packet(payload: &[u8]) -> bool {
    payload.first() == Some(&0xFF)
}
