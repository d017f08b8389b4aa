use crate::constant::ServerStatusFlags;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;

/// Parsed EOF packet payload (first byte `0xFE`, length < 9).
///
/// Servers that predate the full EOF format may send a bare `0xFE`
/// byte; the missing fields read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EofPayload {
    pub warning_count: u16,
    pub status_flags: ServerStatusFlags,
}

impl EofPayload {
    pub fn parse(payload: &[u8]) -> Self {
        let warning_count = read_int_2(payload.get(1..).unwrap_or(&[]))
            .map(|(v, _)| v)
            .unwrap_or(0);
        let status = read_int_2(payload.get(3..).unwrap_or(&[]))
            .map(|(v, _)| v)
            .unwrap_or(0);
        Self {
            warning_count,
            status_flags: ServerStatusFlags::from_bits_truncate(status),
        }
    }

    /// Bit 0x0008: more result sets follow this one.
    pub fn has_next(&self) -> bool {
        self.status_flags
            .contains(ServerStatusFlags::SERVER_MORE_RESULTS_EXISTS)
    }
}

/// Raw bytes of a server error packet (first byte `0xFF`).
#[derive(Debug)]
pub struct ErrPayloadBytes<'a>(pub &'a [u8]);

/// The ERR packet parsed from ErrPayloadBytes
#[derive(Debug, Clone, thiserror::Error)]
#[error("ERROR {} ({}): {}", self.error_code, self.sql_state, self.message)]
pub struct ErrPayload {
    pub error_code: u16,
    pub sql_state: String,
    pub message: String,
}

impl TryFrom<ErrPayloadBytes<'_>> for ErrPayload {
    type Error = Error;

    fn try_from(bytes: ErrPayloadBytes<'_>) -> Result<Self> {
        let (header, data) = read_int_1(bytes.0)?;
        debug_assert_eq!(header, 0xFF);

        let (error_code, data) = read_int_2(data)?;

        // A '#' marker introduces the 5-byte SQLSTATE; older servers
        // omit both.
        let (sql_state, data) = if data.first() == Some(&b'#') {
            let (state, rest) = read_string_fix(&data[1..], 5)?;
            (String::from_utf8_lossy(state).to_string(), rest)
        } else {
            (String::new(), data)
        };

        Ok(ErrPayload {
            error_code,
            sql_state,
            message: String::from_utf8_lossy(data).to_string(), // string<EOF>
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn eof_carries_warnings_and_more_results() {
        let eof = EofPayload::parse(&[0xFE, 0x02, 0x00, 0x08, 0x00]);
        assert_eq!(eof.warning_count, 2);
        assert!(eof.has_next());

        let eof = EofPayload::parse(&[0xFE, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(eof.warning_count, 0);
        assert!(!eof.has_next());
    }

    #[test]
    fn eof_tolerates_a_bare_type_byte() {
        let eof = EofPayload::parse(&[0xFE]);
        assert_eq!(eof.warning_count, 0);
        assert!(!eof.has_next());
    }

    #[test]
    fn err_payload_parses_code_state_message() {
        let mut payload = vec![0xFF, 0x48, 0x04]; // 1096
        payload.extend_from_slice(b"#HY000No tables used");
        let err = ErrPayload::try_from(ErrPayloadBytes(&payload)).unwrap();
        assert_eq!(err.error_code, 1096);
        assert_eq!(err.sql_state, "HY000");
        assert_eq!(err.message, "No tables used");
        assert_eq!(err.to_string(), "ERROR 1096 (HY000): No tables used");
    }

    #[test]
    fn err_payload_without_sqlstate_marker() {
        let mut payload = vec![0xFF, 0x15, 0x04];
        payload.extend_from_slice(b"Access denied");
        let err = ErrPayload::try_from(ErrPayloadBytes(&payload)).unwrap();
        assert_eq!(err.error_code, 1045);
        assert_eq!(err.sql_state, "");
        assert_eq!(err.message, "Access denied");
    }
}
