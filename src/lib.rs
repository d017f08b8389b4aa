//! Result-set decoding and ROWDAT_1 row-batch codecs for SingleStoreDB
//! clients.
//!
//! Three components, leaves first:
//! - [`protocol`]: MySQL wire-format packet assembly over a blocking
//!   [`ByteSource`], with sequence-number discipline and EOF/error
//!   packet recognition.
//! - [`resultset`]: the text-protocol row decoder, driven per batch via
//!   [`resultset::ResultSet::read_rowdata_packet`].
//! - [`rowdat`]: the ROWDAT_1 binary batch codec (row-oriented and
//!   column-oriented), used to exchange table batches with external UDF
//!   servers.

mod conn;
pub mod constant;
mod encoding;
pub mod error;
mod opts;
pub mod protocol;
pub mod resultset;
pub mod rowdat;
mod stream;
mod temporal;
mod value;

pub use conn::Conn;
pub use encoding::{ColumnEncoding, EncodingErrors};
pub use opts::{DecodeOptions, RowShape};
pub use stream::{ByteSource, Stream};
pub use value::{CellInput, Converter, LabeledRow, Row, Value};
