//! Per-column character decoding.
//!
//! Charset conversion tables are delegated: UTF-8 goes through
//! `simdutf8`, everything else through `encoding_rs`. The decoder never
//! transcodes on the hot path for binary columns.

use std::borrow::Cow;

use crate::error::{Error, Result, eyre};

/// Character encoding of one column, resolved once per result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnEncoding {
    /// No character data; cells pass through as raw bytes.
    Binary,
    /// The common case for SingleStoreDB (`utf8` / `utf8mb4`).
    Utf8,
    /// Any other MySQL charset, decoded via `encoding_rs`.
    Other(&'static encoding_rs::Encoding),
}

impl ColumnEncoding {
    /// Resolve an encoding label as the server reports it. Returns
    /// `None` for labels neither we nor `encoding_rs` know.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "binary" => Some(Self::Binary),
            "utf8" | "utf-8" | "utf8mb3" | "utf8mb4" => Some(Self::Utf8),
            // MySQL's "latin1" is cp1252, which is what the WHATWG
            // label "latin1" resolves to as well.
            other => encoding_rs::Encoding::for_label(other.as_bytes()).map(Self::Other),
        }
    }

    pub fn is_binary(self) -> bool {
        matches!(self, Self::Binary)
    }
}

/// Policy for characters that do not decode, mirroring the usual
/// `strict` / `replace` / `ignore` modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingErrors {
    #[default]
    Strict,
    Replace,
    Ignore,
}

impl EncodingErrors {
    /// Anything unrecognised falls back to strict, the default policy.
    pub fn from_name(name: &str) -> Self {
        match name {
            "replace" => Self::Replace,
            "ignore" => Self::Ignore,
            _ => Self::Strict,
        }
    }
}

/// Decode one non-binary cell according to the column encoding and the
/// result set's error policy.
pub(crate) fn decode_text<'a>(
    encoding: ColumnEncoding,
    raw: &'a [u8],
    errors: EncodingErrors,
) -> Result<Cow<'a, str>> {
    match encoding {
        ColumnEncoding::Binary => Err(Error::LibraryBug(eyre!(
            "decode_text called on a binary column"
        ))),
        ColumnEncoding::Utf8 => match simdutf8::basic::from_utf8(raw) {
            Ok(text) => Ok(Cow::Borrowed(text)),
            Err(_) => match errors {
                EncodingErrors::Strict => Err(Error::Encoding(
                    "invalid UTF-8 sequence in text cell".to_string(),
                )),
                EncodingErrors::Replace => Ok(String::from_utf8_lossy(raw)),
                EncodingErrors::Ignore => {
                    let lossy = String::from_utf8_lossy(raw);
                    Ok(Cow::Owned(lossy.chars().filter(|&c| c != '\u{FFFD}').collect()))
                }
            },
        },
        ColumnEncoding::Other(enc) => {
            let (text, had_errors) = enc.decode_without_bom_handling(raw);
            if !had_errors {
                return Ok(text);
            }
            match errors {
                EncodingErrors::Strict => Err(Error::Encoding(format!(
                    "undecodable {} sequence in text cell",
                    enc.name()
                ))),
                EncodingErrors::Replace => Ok(text),
                EncodingErrors::Ignore => {
                    Ok(Cow::Owned(text.chars().filter(|&c| c != '\u{FFFD}').collect()))
                }
            }
        }
    }
}
