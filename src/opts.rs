use std::collections::HashMap;

use smart_default::SmartDefault;

use crate::encoding::EncodingErrors;
use crate::value::{Converter, Value};

/// Output shape of decoded rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    Tuples,
    Dicts,
    NamedTuples,
    StructSequences,
}

impl RowShape {
    /// Resolve the configured name, accepting both singular and plural
    /// spellings. Anything unrecognised means plain tuples.
    pub fn from_name(name: &str) -> Self {
        match name {
            "dict" | "dicts" => Self::Dicts,
            "namedtuple" | "namedtuples" => Self::NamedTuples,
            "structsequence" | "structsequences" => Self::StructSequences,
            _ => Self::Tuples,
        }
    }
}

/// Configuration for one result set's decoder.
///
/// ```
/// use s2_rowio::{DecodeOptions, RowShape};
///
/// let mut opts = DecodeOptions::default();
/// opts.results_type = RowShape::from_name("namedtuples");
/// opts.parse_json = true;
/// ```
#[derive(Clone, SmartDefault)]
pub struct DecodeOptions {
    #[default(RowShape::Tuples)]
    pub results_type: RowShape,

    /// Parse `MYSQL_TYPE_JSON` cells into JSON values instead of
    /// returning their text.
    pub parse_json: bool,

    /// Substitute returned when a date/time cell fails strict
    /// validation, keyed by column type code. Columns without an entry
    /// fall back to the raw cell text.
    pub invalid_values: HashMap<u8, Value>,

    /// The default converter per type code. A column whose converter is
    /// the same `Arc` as the default for its type runs the built-in
    /// fast path instead.
    pub default_converters: HashMap<u8, Converter>,

    /// Read only as many rows as each call requests, leaving the
    /// stream open between calls.
    pub unbuffered: bool,

    /// Policy for character-encoding errors in text cells.
    pub encoding_errors: EncodingErrors,
}
