use thiserror::Error;

pub use color_eyre::eyre::eyre;

use crate::protocol::response::{ErrPayload, ErrPayloadBytes};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Error packet sent by the server, already parsed.
    #[error("Server Error: {0}")]
    ServerError(#[from] ErrPayload),

    /// Connection-level failure; the connection has been force-closed
    /// and must be discarded.
    #[error("OperationalError: {0}")]
    Operational(String),

    /// Protocol state violation (e.g. a wrong packet sequence number);
    /// the connection has been force-closed.
    #[error("InternalError: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A column type code outside the known table.
    #[error("unknown column type code: {0}")]
    UnknownType(i32),

    /// A known type code that the requested operation does not support.
    #[error("unsupported column type: {0}")]
    Unsupported(String),

    /// Malformed or out-of-range data (colspec/buffer misalignment,
    /// value outside the target SQL type's range, arity mismatch).
    #[error("{0}")]
    InvalidData(String),

    #[error("invalid integer value: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("invalid float value: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    #[error("invalid decimal value: {0}")]
    ParseDecimal(#[from] rust_decimal::Error),

    #[error("invalid JSON value: {0}")]
    ParseJson(#[from] serde_json::Error),

    /// Strict-mode character decoding failure.
    #[error("character decoding failed: {0}")]
    Encoding(String),

    #[error("malformed packet")]
    InvalidPacket,

    #[error("unexpected end of packet")]
    UnexpectedEof,

    #[error("A bug in s2-rowio: {0}")]
    LibraryBug(color_eyre::Report),
}

impl<'buf> From<ErrPayloadBytes<'buf>> for Error {
    fn from(value: ErrPayloadBytes) -> Self {
        match ErrPayload::try_from(value) {
            Ok(err_payload) => Error::ServerError(err_payload),
            Err(err) => err,
        }
    }
}

impl Error {
    /// True if the error leaves the connection unusable.
    ///
    /// Pool implementations use this to decide between resetting and
    /// dropping a connection.
    pub fn is_conn_broken(&self) -> bool {
        matches!(
            self,
            Error::Operational(_) | Error::Internal(_) | Error::IoError(_) | Error::InvalidPacket
        )
    }
}
