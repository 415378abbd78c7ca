//! Error taxonomy for schema loading, compilation, and decoding.
//!
//! Failures during schema load/compile are always fatal for the whole
//! session; failures during decode of a single record can be recovered from
//! by the frame parser in resilient mode.

use std::path::PathBuf;

/// A schema attribute is missing, ill-typed, or structurally invalid.
///
/// Always carries the offending item's name and, where known, the schema
/// file it came from, so a caller can point a schema author straight at the
/// problem.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("item '{name}' in {file:?} has no required attribute '{attribute}'")]
    MissingAttribute {
        name: String,
        file: Option<PathBuf>,
        attribute: &'static str,
    },
    #[error("item '{name}' in {file:?} has unknown or mismatched data_type '{data_type}'")]
    BadDataType {
        name: String,
        file: Option<PathBuf>,
        data_type: String,
    },
    #[error("fixed_bitfield '{name}' in {file:?} has length {length} bytes, must be <= 8")]
    BitfieldTooLong {
        name: String,
        file: Option<PathBuf>,
        length: usize,
    },
    #[error(
        "fixed_bitfield '{name}' in {file:?} sub-item '{sub_item}' bit range [{start}, {end}) \
         falls outside [0, {bound})"
    )]
    BitRangeOutOfBitfield {
        name: String,
        file: Option<PathBuf>,
        sub_item: String,
        start: usize,
        end: usize,
        bound: usize,
    },
    #[error("compound '{name}' in {file:?} field_specification must be type 'extendable'")]
    FieldSpecificationNotExtendable { name: String, file: Option<PathBuf> },
    #[error("item '{name}' in {file:?} has an empty item list where at least one is required")]
    EmptyItemList { name: String, file: Option<PathBuf> },
    #[error(
        "item '{name}' in {file:?} optional_variable_name '{path}' is not a syntactically valid dotted path"
    )]
    BadVariablePath {
        name: String,
        file: Option<PathBuf>,
        path: String,
    },
    #[error("fixed_bits/fixed_bytes '{name}' in {file:?} has zero-length field")]
    ZeroLengthField { name: String, file: Option<PathBuf> },
    #[error("fixed_bitfield '{name}' in {file:?} sub-item '{sub_item}' must be type 'fixed_bits'")]
    BitfieldSubItemNotBits {
        name: String,
        file: Option<PathBuf>,
        sub_item: String,
    },
}

/// The schema JSON itself could not be parsed or its files could not be found.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("could not read schema file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse schema file {path} as JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("category {number} listed in category index has no matching definition file")]
    UnknownCategoryFile { number: u32 },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// A bit/byte read went past the end of the buffer, or asked for too much.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("read past end of buffer")]
    OutOfBounds,
    #[error("cannot read more than 64 bits into a scalar")]
    TooManyBitsRead,
    #[error("float read requires byte alignment and bit_len in {{32, 64}}")]
    Misaligned,
    #[error("field contains a byte outside 0..=0x7F and lossless mode was not requested")]
    InvalidAscii,
}

/// Failure while decoding a single record. Recoverable by the frame parser
/// in resilient mode.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("read error while decoding '{item}': {source}")]
    Read {
        item: String,
        #[source]
        source: ReadError,
    },
    #[error(
        "record declared length {declared} but {consumed} bytes (incl. header) were consumed"
    )]
    LengthMismatch { declared: usize, consumed: usize },
    #[error("'{path}' referenced by '{item}' does not resolve against the parent context")]
    VariableResolution { item: String, path: String },
    #[error("'{path}' referenced by '{item}' is not the expected numeric kind")]
    TypeMismatch { item: String, path: String },
    #[error("ASCII field '{item}' contains a byte outside 0..=0x7F")]
    InvalidAscii { item: String },
    #[error("category {category} has no configured item catalogue")]
    UnknownCategory { category: u8 },
}

/// Top-level error returned by the orchestrator.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not map input file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}
