//! Delimited text writer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::dialect::{is_terminator, WriterOptions};
use crate::error::{CsvError, Result};
use crate::headers::HeaderRegistry;
use crate::value::Value;

/// Writes records using the dialect rules the reader understands.
///
/// Every record has the same number of fields: the header length when
/// headers are configured, otherwise the length of the first record.
/// Shorter records are padded with empty fields and longer ones are cut.
///
/// ```
/// use emx_csvdata::{RecordWriter, WriterOptions};
///
/// let options = WriterOptions::new().with_headers(["Name", "Note"]);
/// let mut writer = RecordWriter::new(Vec::new(), &options).unwrap();
/// writer.write(&["Ann", "says \"hi\"; twice"]).unwrap();
///
/// let bytes = writer.into_inner().unwrap();
/// assert_eq!(
///     String::from_utf8(bytes).unwrap(),
///     "Name;Note\r\nAnn;\"says \"\"hi\"\"; twice\""
/// );
/// ```
pub struct RecordWriter<W: Write> {
    out: BufWriter<W>,
    options: WriterOptions,
    headers: Rc<HeaderRegistry>,
    field_count: Option<usize>,
    lines_written: u64,
    warned_unquotable: bool,
}

impl<W: Write> RecordWriter<W> {
    /// Create a writer and emit the header row, if any.
    ///
    /// The writer owns `out`; pass `&mut out` to keep using the stream
    /// afterwards.
    pub fn new(out: W, options: &WriterOptions) -> Result<Self> {
        options.validate()?;

        let mut headers = HeaderRegistry::new();
        for name in &options.headers {
            headers.add(name, false);
        }
        let field_count = if headers.is_empty() { None } else { Some(headers.len()) };

        let mut writer = Self {
            out: BufWriter::new(out),
            options: options.clone(),
            headers: Rc::new(headers),
            field_count,
            lines_written: 0,
            warned_unquotable: false,
        };

        if !writer.headers.is_empty() {
            let names: Vec<String> = writer.headers.names().map(str::to_string).collect();
            debug!("Writing header row: {:?}", names);
            writer.write_line(&names, 0)?;
        }
        Ok(writer)
    }

    /// Fields per record, once known
    pub fn field_count(&self) -> Option<usize> {
        self.field_count
    }

    /// Column names after deduplication
    pub fn headers(&self) -> &HeaderRegistry {
        &self.headers
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Lines written so far, the header row included
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Write one record.
    ///
    /// Without headers the first record fixes the field count. Missing
    /// fields are written as bare delimiters, never quoted.
    ///
    /// A record made of one empty field comes out as an empty line, which
    /// reads back as a blank record.
    pub fn write<S: AsRef<str>>(&mut self, record: &[S]) -> Result<()> {
        let count = *self.field_count.get_or_insert(record.len());
        let supplied = record.len().min(count);
        self.write_line(&record[..supplied], count - supplied)
    }

    /// An empty record keyed by the header names
    pub fn new_row(&self) -> Row {
        Row::new(Rc::clone(&self.headers))
    }

    /// Write a record built with [`new_row`](Self::new_row); unset fields are empty.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        let fields: Vec<&str> = row.values.iter().map(|v| v.as_deref().unwrap_or("")).collect();
        self.write(&fields)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and give back the stream
    pub fn into_inner(self) -> Result<W> {
        self.out.into_inner().map_err(|e| CsvError::Io(e.into_error()))
    }

    fn write_line<S: AsRef<str>>(&mut self, fields: &[S], padding: usize) -> Result<()> {
        let mut line = String::new();
        if self.lines_written > 0 {
            line.push_str(&self.options.line_terminator);
        }

        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                line.push_str(&self.options.delimiter);
            }
            if !push_field(&mut line, &self.options, field.as_ref()) && !self.warned_unquotable {
                warn!("Field needs quoting but no quote character is configured; writing it verbatim");
                self.warned_unquotable = true;
            }
        }
        for i in 0..padding {
            if i > 0 || !fields.is_empty() {
                line.push_str(&self.options.delimiter);
            }
        }

        let (bytes, encoding, had_errors) = self.options.encoding.encode(&line);
        if had_errors {
            return Err(CsvError::Unencodable {
                encoding: encoding.name(),
                text: line.trim_start_matches(is_terminator).to_string(),
            });
        }
        self.out.write_all(&bytes)?;
        self.lines_written += 1;
        if self.lines_written == 1 {
            info!("Started writing CSV with {} fields per record", fields.len() + padding);
        }
        Ok(())
    }
}

impl RecordWriter<File> {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl AsRef<Path>, options: &WriterOptions) -> Result<Self> {
        let path = path.as_ref();
        info!("Creating CSV output: {}", path.display());
        Self::new(File::create(path)?, options)
    }
}

/// Append `field` to `line`, quoting it when needed.
///
/// Returns `false` when the field needed quoting but no quote character is
/// configured.
fn push_field(line: &mut String, options: &WriterOptions, field: &str) -> bool {
    // Any delimiter character forces quotes, so no part of a multi-character
    // delimiter can sit unquoted at a field edge.
    let needs_quotes = field
        .chars()
        .any(|ch| is_terminator(ch) || Some(ch) == options.quote || options.delimiter.contains(ch));

    match options.quote {
        Some(quote) if options.force_quotes || needs_quotes => {
            line.push(quote);
            for ch in field.chars() {
                if ch == quote {
                    line.push(quote);
                }
                line.push(ch);
            }
            line.push(quote);
            true
        }
        _ => {
            line.push_str(field);
            !needs_quotes
        }
    }
}

/// A record addressed by column name.
#[derive(Debug, Clone)]
pub struct Row {
    headers: Rc<HeaderRegistry>,
    values: Vec<Option<String>>,
}

impl Row {
    fn new(headers: Rc<HeaderRegistry>) -> Self {
        let values = vec![None; headers.len()];
        Self { headers, values }
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<&mut Self> {
        let ordinal = self.headers.ordinal(name)?;
        self.values[ordinal] = Some(value.into());
        Ok(self)
    }

    /// Store the text form of a typed value; `Null` clears the field
    pub fn set_value(&mut self, name: &str, value: &Value) -> Result<&mut Self> {
        let ordinal = self.headers.ordinal(name)?;
        self.values[ordinal] = if value.is_null() { None } else { Some(value.to_string()) };
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<Option<&str>> {
        let ordinal = self.headers.ordinal(name)?;
        Ok(self.values[ordinal].as_deref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.headers.names()
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|v| *v = None);
    }
}
