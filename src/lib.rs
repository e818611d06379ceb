//! # emx-csvdata
//!
//! Streaming reader and writer for delimited text (CSV and its relatives).
//!
//! The dialect is configurable: a delimiter of one or more characters, an
//! optional quote character, the text encoding, whether the first record
//! names the columns, and whether blank lines are skipped.
//!
//! ## Reading
//!
//! ```text
//! Name;City;Note
//! Ann;Oslo;"says ""hi"""
//! Bob;"Rio
//! de Janeiro";
//! ```
//!
//! A [`RecordReader`] pulls one record at a time. Fields are addressed by
//! ordinal or by column name and can be read as raw text or as a typed
//! [`Value`] coerced to the column's declared [`ColumnType`].
//!
//! ## Record terminators
//!
//! `\n`, `\r`, `\r\n`, U+0085, U+2028 and U+2029 all end a record unless
//! they appear inside a quoted field.
//!
//! ## Quoting
//!
//! A quote character opens a quoted field only as the first character of
//! the field. Inside it, a doubled quote stands for one quote. A quote that
//! is not followed by a delimiter, a terminator or the end of input is kept
//! as text.
//!
//! ## Virtual columns
//!
//! Extra named columns can be appended after the real ones. Their values
//! come from a [`VirtualResolver`] instead of the input.
//!
//! ## Several inputs
//!
//! [`MultiSourceReader`] opens several inputs at once and walks them in
//! order, each with its own header line.
//!
//! ## Writing
//!
//! [`RecordWriter`] emits records with the same dialect rules, quoting only
//! the fields that need it.

pub mod column;
pub mod dialect;
pub mod error;
pub mod headers;
pub mod multi;
pub mod reader;
pub mod tokenizer;
pub mod value;
pub mod writer;

pub use column::{Column, ColumnType};
pub use dialect::{ReaderOptions, WriterOptions};
pub use error::{CsvError, Result};
pub use headers::HeaderRegistry;
pub use multi::MultiSourceReader;
pub use reader::{ParseHook, ReaderBuilder, RecordReader, RecordSource, SharedResolver, VirtualResolver};
pub use tokenizer::{FieldEnd, FieldTokenizer};
pub use value::{coerce, Value};
pub use writer::{RecordWriter, Row};
