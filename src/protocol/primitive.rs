use crate::error::{Error, Result};
use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U64 as U64LE};

/// Read 1-byte integer
pub fn read_int_1(data: &[u8]) -> Result<(u8, &[u8])> {
    if data.is_empty() {
        return Err(Error::UnexpectedEof);
    }
    Ok((data[0], &data[1..]))
}

/// Read 2-byte little-endian integer
pub fn read_int_2(data: &[u8]) -> Result<(u16, &[u8])> {
    if data.len() < 2 {
        return Err(Error::UnexpectedEof);
    }
    let value = U16LE::ref_from_bytes(&data[..2])
        .map_err(|_| Error::InvalidPacket)?
        .get();
    Ok((value, &data[2..]))
}

/// Read 3-byte little-endian integer
pub fn read_int_3(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 3 {
        return Err(Error::UnexpectedEof);
    }
    let value = u32::from_le_bytes([data[0], data[1], data[2], 0]);
    Ok((value, &data[3..]))
}

/// Read 8-byte little-endian integer
pub fn read_int_8(data: &[u8]) -> Result<(u64, &[u8])> {
    if data.len() < 8 {
        return Err(Error::UnexpectedEof);
    }
    let value = U64LE::ref_from_bytes(&data[..8])
        .map_err(|_| Error::InvalidPacket)?
        .get();
    Ok((value, &data[8..]))
}

/// Read length-encoded integer
pub fn read_int_lenenc(data: &[u8]) -> Result<(u64, &[u8])> {
    if data.is_empty() {
        return Err(Error::UnexpectedEof);
    }

    match data[0] {
        0xFC => {
            let (val, rest) = read_int_2(&data[1..])?;
            Ok((u64::from(val), rest))
        }
        0xFD => {
            let (val, rest) = read_int_3(&data[1..])?;
            Ok((u64::from(val), rest))
        }
        0xFE => read_int_8(&data[1..]),
        val => Ok((u64::from(val), &data[1..])),
    }
}

/// Read one length-coded row cell: `None` for NULL, otherwise the cell
/// bytes and the remaining payload.
///
/// This is the permissive variant used on the row path: the NULL
/// sentinel `0xFB` and the reserved first byte `0xFF` both mean NULL, a
/// length prefix truncated by the packet boundary also reads as NULL,
/// and a length that exceeds the remaining payload is clamped to it.
pub fn read_lcs(data: &[u8]) -> (Option<&[u8]>, &[u8]) {
    let Some(&first) = data.first() else {
        return (None, data);
    };
    let (len, rest) = match first {
        0xFB | 0xFF => return (None, &data[1..]),
        0xFC => {
            let Some(prefix) = data.get(1..3) else {
                return (None, &data[data.len()..]);
            };
            (u64::from(prefix[0]) | u64::from(prefix[1]) << 8, &data[3..])
        }
        0xFD => {
            let Some(prefix) = data.get(1..4) else {
                return (None, &data[data.len()..]);
            };
            (
                u64::from(prefix[0]) | u64::from(prefix[1]) << 8 | u64::from(prefix[2]) << 16,
                &data[4..],
            )
        }
        0xFE => {
            let Some(prefix) = data.get(1..9) else {
                return (None, &data[data.len()..]);
            };
            let mut len = 0u64;
            for (i, &b) in prefix.iter().enumerate() {
                len |= u64::from(b) << (8 * i);
            }
            (len, &data[9..])
        }
        short => (u64::from(short), &data[1..]),
    };
    // Clamp to the remaining payload instead of erroring on truncation.
    let len = usize::try_from(len).unwrap_or(usize::MAX).min(rest.len());
    (Some(&rest[..len]), &rest[len..])
}

/// Read fixed-length string
pub fn read_string_fix(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(Error::UnexpectedEof);
    }
    Ok((&data[..len], &data[len..]))
}

/// Write 2-byte little-endian integer
pub fn write_int_2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 3-byte little-endian integer
pub fn write_int_3(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

/// Write 8-byte little-endian integer
pub fn write_int_8(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write length-encoded integer
pub fn write_int_lenenc(out: &mut Vec<u8>, value: u64) {
    if value < 251 {
        out.push(value as u8);
    } else if value < (1 << 16) {
        out.push(0xfc);
        write_int_2(out, value as u16);
    } else if value < (1 << 24) {
        out.push(0xfd);
        write_int_3(out, value as u32);
    } else {
        out.push(0xfe);
        write_int_8(out, value);
    }
}

/// Write length-encoded bytes
pub fn write_bytes_lenenc(out: &mut Vec<u8>, data: &[u8]) {
    write_int_lenenc(out, data.len() as u64);
    out.extend_from_slice(data);
}
