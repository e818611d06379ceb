//! Dialect configuration for readers and writers
//!
//! Both option structs are cloned when a reader or writer is built, so
//! changing a shared options value afterwards never affects an open
//! instance.

use encoding_rs::Encoding;

use crate::error::{CsvError, Result};

pub const DEFAULT_DELIMITER: &str = ";";
pub const DEFAULT_QUOTE: char = '"';
pub const DEFAULT_LINE_TERMINATOR: &str = "\r\n";

/// Line feed
pub const LF: char = '\u{000A}';
/// Carriage return
pub const CR: char = '\u{000D}';
/// Next line
pub const NEL: char = '\u{0085}';
/// Line separator
pub const LS: char = '\u{2028}';
/// Paragraph separator
pub const PS: char = '\u{2029}';

/// Whether `ch` starts a record terminator
pub fn is_terminator(ch: char) -> bool {
    matches!(ch, LF | CR | NEL | LS | PS)
}

fn validate_dialect(delimiter: &str, quote: Option<char>) -> Result<()> {
    if delimiter.is_empty() {
        return Err(CsvError::InvalidDialect("delimiter must not be empty".to_string()));
    }
    if delimiter.chars().any(is_terminator) {
        return Err(CsvError::InvalidDialect(format!(
            "delimiter {:?} contains a line terminator",
            delimiter
        )));
    }
    if let Some(quote) = quote {
        if delimiter.contains(quote) {
            return Err(CsvError::InvalidDialect(format!(
                "delimiter {:?} contains the quote character {:?}",
                delimiter, quote
            )));
        }
        if is_terminator(quote) {
            return Err(CsvError::InvalidDialect(format!(
                "quote character {:?} is a line terminator",
                quote
            )));
        }
    }
    Ok(())
}

fn encoding_for_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| CsvError::InvalidDialect(format!("unknown encoding '{}'", label)))
}

/// Options for [`RecordReader`](crate::RecordReader)
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Text encoding of the input; a byte order mark overrides it
    pub encoding: &'static Encoding,
    /// Field delimiter, one or more characters
    pub delimiter: String,
    /// Quote character, `None` disables quoting
    pub quote: Option<char>,
    /// Take column names from the first record
    pub first_line_is_header: bool,
    /// Hide records that contain no fields
    pub skip_blank_lines: bool,
    /// Names of computed columns appended after the real ones
    pub virtual_fields: Vec<String>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            encoding: encoding_rs::UTF_8,
            delimiter: DEFAULT_DELIMITER.to_string(),
            quote: Some(DEFAULT_QUOTE),
            first_line_is_header: true,
            skip_blank_lines: true,
            virtual_fields: Vec::new(),
        }
    }
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_quote(mut self, quote: Option<char>) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the encoding from a WHATWG label such as `utf-8` or `windows-1251`
    pub fn with_encoding_label(mut self, label: &str) -> Result<Self> {
        self.encoding = encoding_for_label(label)?;
        Ok(self)
    }

    pub fn with_header(mut self, first_line_is_header: bool) -> Self {
        self.first_line_is_header = first_line_is_header;
        self
    }

    pub fn with_skip_blank_lines(mut self, skip: bool) -> Self {
        self.skip_blank_lines = skip;
        self
    }

    pub fn with_virtual_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.virtual_fields = names.into_iter().map(Into::into).collect();
        self
    }

    /// Check that the options describe a usable dialect
    pub fn validate(&self) -> Result<()> {
        validate_dialect(&self.delimiter, self.quote)
    }
}

/// Options for [`RecordWriter`](crate::RecordWriter)
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Output encoding; encodings without an encoder fall back to UTF-8
    pub encoding: &'static Encoding,
    pub delimiter: String,
    /// Quote character, `None` writes every field verbatim
    pub quote: Option<char>,
    /// Quote every field, not only the ones that need it
    pub force_quotes: bool,
    /// Header row; empty means no header and a field count taken from the
    /// first record
    pub headers: Vec<String>,
    /// Written between records
    pub line_terminator: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            encoding: encoding_rs::UTF_8,
            delimiter: DEFAULT_DELIMITER.to_string(),
            quote: Some(DEFAULT_QUOTE),
            force_quotes: false,
            headers: Vec::new(),
            line_terminator: DEFAULT_LINE_TERMINATOR.to_string(),
        }
    }
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_quote(mut self, quote: Option<char>) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_encoding_label(mut self, label: &str) -> Result<Self> {
        self.encoding = encoding_for_label(label)?;
        Ok(self)
    }

    pub fn with_force_quotes(mut self, force: bool) -> Self {
        self.force_quotes = force;
        self
    }

    pub fn with_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_dialect(&self.delimiter, self.quote)?;
        if self.line_terminator.is_empty() || !self.line_terminator.chars().all(is_terminator) {
            return Err(CsvError::InvalidDialect(format!(
                "line terminator {:?} must consist of terminator characters",
                self.line_terminator
            )));
        }
        Ok(())
    }
}
