//! Error types for reading and writing delimited text.

use thiserror::Error;

use crate::column::ColumnType;

/// The error type for all reader and writer operations in this crate.
#[derive(Debug, Error)]
pub enum CsvError {
    /// The underlying stream failed while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Readers need a seekable stream; the position query failed.
    #[error("Stream does not support seeking: {0}")]
    NotSeekable(#[source] std::io::Error),

    /// The dialect options cannot describe a valid format.
    #[error("Invalid dialect: {0}")]
    InvalidDialect(String),

    /// A non-empty field could not be coerced to its declared type.
    #[error("Cannot convert value of column '{column}' [{value}] to type {target}")]
    Conversion {
        column: String,
        value: String,
        target: ColumnType,
    },

    /// A column ordinal outside the registered real and virtual columns.
    #[error("Column ordinal {ordinal} is out of range (column count {count})")]
    OrdinalOutOfRange { ordinal: usize, count: usize },

    /// A column name that is not registered.
    #[error("Unknown column: '{0}'")]
    UnknownColumn(String),

    /// A multi-source reader was opened without any source.
    #[error("At least one input source is required")]
    NoSources,

    /// The output encoding has no mapping for some of the text.
    #[error("Cannot encode record as {encoding}: {text}")]
    Unencodable { encoding: &'static str, text: String },
}

/// A convenience `Result` type alias using [`CsvError`].
pub type Result<T> = std::result::Result<T, CsvError>;
