use std::io::{BufReader, Read};
use std::net::{Shutdown, TcpStream};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use auto_impl::auto_impl;

/// Blocking byte source feeding the packet transport.
///
/// The transport re-applies the read timeout before every read and
/// force-closes the source on any unrecoverable failure, so
/// implementations only need plain blocking semantics.
#[auto_impl(&mut, Box)]
pub trait ByteSource {
    /// Read up to `buf.len()` bytes. A return of `Ok(0)` means the peer
    /// closed the connection.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Apply a read timeout to subsequent reads. `None` blocks forever.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()>;

    /// Tear the transport down. Further reads are expected to fail.
    fn close(&mut self);
}

/// Socket transports understood out of the box.
pub enum Stream {
    Tcp(BufReader<TcpStream>),
    Unix(BufReader<UnixStream>),
}

impl Stream {
    pub fn tcp(stream: TcpStream) -> Self {
        Self::Tcp(BufReader::new(stream))
    }

    pub fn unix(stream: UnixStream) -> Self {
        Self::Unix(BufReader::new(stream))
    }
}

impl ByteSource for Stream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Tcp(r) => r.read(buf),
            Self::Unix(r) => r.read(buf),
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()> {
        match self {
            Self::Tcp(r) => r.get_ref().set_read_timeout(timeout),
            Self::Unix(r) => r.get_ref().set_read_timeout(timeout),
        }
    }

    fn close(&mut self) {
        let _ = match self {
            Self::Tcp(r) => r.get_ref().shutdown(Shutdown::Both),
            Self::Unix(r) => r.get_ref().shutdown(Shutdown::Both),
        };
    }
}

/// In-memory byte source, useful for decoding captured wire bytes and
/// for tests.
impl<T: AsRef<[u8]>> ByteSource for std::io::Cursor<T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Read::read(self, buf)
    }

    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> std::io::Result<()> {
        Ok(())
    }

    fn close(&mut self) {}
}
