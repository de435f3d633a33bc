use thiserror::Error;

/// Every fallible operation in this crate returns one of these variants.
///
/// Construction errors (`UnsupportedFormat`, `TableMissing`, `NoUsableEncoding`)
/// surface from [`crate::Parser::open`]; the rest surface from
/// [`crate::Parser::render`].
#[derive(Debug, Error)]
pub enum FontError {
    #[error("unsupported sfnt version: expected 0x00010000 or 'true', got {0:#010x}")]
    UnsupportedFormat(u32),

    #[error("required table '{tag}' is missing from the font")]
    TableMissing { tag: &'static str },

    #[error("cmap has no usable encoding subtable (only formats 0 and 4 are supported)")]
    NoUsableEncoding,

    #[error("code point U+{code_point:04X} is unmapped in the format 0 cmap")]
    UnmappedCodePoint { code_point: u32 },

    #[error("parse error in '{table}' at offset {offset}: {reason}")]
    ParseError {
        table: &'static str,
        offset: usize,
        reason: String,
    },

    #[error("out of memory while allocating {requested} bytes")]
    OutOfMemory { requested: usize },
}

impl FontError {
    pub(crate) fn parse(table: &'static str, offset: usize, reason: impl Into<String>) -> Self {
        FontError::ParseError {
            table,
            offset,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FontError>;
