//! Record reader
//!
//! Pulls fields from a [`FieldTokenizer`] and assembles them into records,
//! discovers or synthesizes column names, and hands out raw or coerced
//! values for the current record.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, info, trace};

use crate::column::{Column, ColumnType};
use crate::dialect::ReaderOptions;
use crate::error::{CsvError, Result};
use crate::headers::HeaderRegistry;
use crate::multi::MultiSourceReader;
use crate::tokenizer::{FieldEnd, FieldTokenizer};
use crate::value::{coerce, Value};

/// Supplies values for virtual columns.
///
/// Called synchronously every time a virtual column value is requested;
/// it must not call back into the reader it serves.
pub trait VirtualResolver {
    fn resolve(&self, column: &Column) -> Value;
}

impl<F> VirtualResolver for F
where
    F: Fn(&Column) -> Value,
{
    fn resolve(&self, column: &Column) -> Value {
        self(column)
    }
}

/// Resolver shared by every reader of a multi-source cursor
pub type SharedResolver = Rc<dyn VirtualResolver>;

/// Custom coercion tried before the built-in rules; `None` falls through.
pub type ParseHook = Rc<dyn Fn(&Column, &str) -> Option<Value>>;

/// The capabilities every record cursor offers.
pub trait RecordSource {
    /// Advance to the next record; `false` once the input is exhausted
    fn read(&mut self) -> Result<bool>;

    /// Columns of the current source
    fn headers(&self) -> &HeaderRegistry;

    /// Field text of the current record
    fn raw(&self, ordinal: usize) -> Result<&str>;

    /// Coerced value of the current record
    fn value(&self, ordinal: usize) -> Result<Value>;

    fn raw_by_name(&self, name: &str) -> Result<&str> {
        let ordinal = self.headers().ordinal(name)?;
        self.raw(ordinal)
    }

    fn value_by_name(&self, name: &str) -> Result<Value> {
        let ordinal = self.headers().ordinal(name)?;
        self.value(ordinal)
    }
}

/// Configures and opens readers.
///
/// ```
/// use emx_csvdata::{ReaderBuilder, ReaderOptions, RecordSource, Value};
/// use std::io::Cursor;
///
/// let options = ReaderOptions::new().with_virtual_fields(["Id"]);
/// let mut reader = ReaderBuilder::new(&options)
///     .resolver(|_: &emx_csvdata::Column| Value::Int32(1))
///     .open(Cursor::new("Name;City\nAnn;Oslo"))
///     .unwrap();
///
/// assert!(reader.read().unwrap());
/// assert_eq!(reader.raw_by_name("City").unwrap(), "Oslo");
/// assert_eq!(reader.value_by_name("Id").unwrap(), Value::Int32(1));
/// ```
#[derive(Clone)]
pub struct ReaderBuilder {
    options: ReaderOptions,
    resolver: Option<SharedResolver>,
    parse_hook: Option<ParseHook>,
}

impl ReaderBuilder {
    pub fn new(options: &ReaderOptions) -> Self {
        Self {
            options: options.clone(),
            resolver: None,
            parse_hook: None,
        }
    }

    /// Resolver for the virtual columns
    pub fn resolver(mut self, resolver: impl VirtualResolver + 'static) -> Self {
        self.resolver = Some(Rc::new(resolver));
        self
    }

    pub fn shared_resolver(mut self, resolver: SharedResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn parse_hook(mut self, hook: impl Fn(&Column, &str) -> Option<Value> + 'static) -> Self {
        self.parse_hook = Some(Rc::new(hook));
        self
    }

    /// Open and initialize a reader over one seekable stream
    pub fn open<R: Read + Seek>(&self, stream: R) -> Result<RecordReader<R>> {
        let mut reader = self.build(stream)?;
        reader.initialize()?;
        Ok(reader)
    }

    pub fn open_path(&self, path: impl AsRef<Path>) -> Result<RecordReader<File>> {
        let path = path.as_ref();
        info!("Opening CSV source: {}", path.display());
        let mut reader = self.build(File::open(path)?)?;
        reader.source_name = Some(path.to_path_buf());
        reader.initialize()?;
        Ok(reader)
    }

    /// Open every stream now; only the first one is initialized
    pub fn open_many<R, I>(&self, streams: I) -> Result<MultiSourceReader<R>>
    where
        R: Read + Seek,
        I: IntoIterator<Item = R>,
    {
        let readers = streams
            .into_iter()
            .map(|stream| self.build(stream))
            .collect::<Result<Vec<_>>>()?;
        MultiSourceReader::from_readers(readers)
    }

    pub fn open_paths<P, I>(&self, paths: I) -> Result<MultiSourceReader<File>>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = P>,
    {
        let readers = paths
            .into_iter()
            .map(|path| -> Result<RecordReader<File>> {
                let path = path.as_ref();
                info!("Opening CSV source: {}", path.display());
                let mut reader = self.build(File::open(path)?)?;
                reader.source_name = Some(path.to_path_buf());
                Ok(reader)
            })
            .collect::<Result<Vec<_>>>()?;
        MultiSourceReader::from_readers(readers)
    }

    fn build<R: Read + Seek>(&self, stream: R) -> Result<RecordReader<R>> {
        let mut reader = RecordReader::new(stream, &self.options, self.resolver.clone())?;
        reader.parse_hook = self.parse_hook.clone();
        Ok(reader)
    }
}

/// Reads records from a single delimited text stream.
///
/// The reader owns its stream; pass `&mut stream` to keep the stream open
/// after the reader is dropped, or take it back with
/// [`into_inner`](Self::into_inner).
pub struct RecordReader<R> {
    tokenizer: FieldTokenizer<R>,
    options: ReaderOptions,
    headers: HeaderRegistry,
    /// One slot per real and virtual column, reused for every record
    fields: Vec<String>,
    scratch: String,
    csv_field_count: usize,
    record_field_count: usize,
    records_read: u64,
    /// First data row, read during header discovery when there is no header line
    pending_first: Option<Vec<String>>,
    header_raw: Option<String>,
    initialized: bool,
    eof: bool,
    resolver: Option<SharedResolver>,
    parse_hook: Option<ParseHook>,
    source_name: Option<PathBuf>,
}

impl<R: Read + Seek> RecordReader<R> {
    /// Open a reader over a seekable stream and discover its columns
    pub fn open(stream: R, options: &ReaderOptions) -> Result<Self> {
        ReaderBuilder::new(options).open(stream)
    }

    pub(crate) fn new(mut stream: R, options: &ReaderOptions, resolver: Option<SharedResolver>) -> Result<Self> {
        stream.stream_position().map_err(CsvError::NotSeekable)?;
        options.validate()?;
        let options = options.clone();

        Ok(Self {
            tokenizer: FieldTokenizer::new(stream, options.encoding, &options.delimiter, options.quote),
            options,
            headers: HeaderRegistry::new(),
            fields: Vec::new(),
            scratch: String::new(),
            csv_field_count: 0,
            record_field_count: 0,
            records_read: 0,
            pending_first: None,
            header_raw: None,
            initialized: false,
            eof: false,
            resolver,
            parse_hook: None,
            source_name: None,
        })
    }
}

impl RecordReader<File> {
    pub fn from_path(path: impl AsRef<Path>, options: &ReaderOptions) -> Result<Self> {
        ReaderBuilder::new(options).open_path(path)
    }
}

impl<R: Read> RecordReader<R> {
    /// Read the first physical record and register the columns. Runs once.
    pub(crate) fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;

        // Leading blank lines never count as the header
        let mut value = String::new();
        let mut end = loop {
            self.tokenizer.clear_raw();
            let end = self.tokenizer.read_field(&mut value)?;
            if !(value.is_empty() && end == FieldEnd::Record) {
                break end;
            }
        };

        let mut first_row = Vec::new();
        if !value.is_empty() || end == FieldEnd::Field {
            first_row.push(value.clone());
            while end == FieldEnd::Field {
                end = self.tokenizer.read_field(&mut value)?;
                first_row.push(value.clone());
            }
        }

        let from_header = self.options.first_line_is_header;
        for name in &first_row {
            self.headers.add(if from_header { name.as_str() } else { "" }, false);
        }
        self.csv_field_count = self.headers.len();

        for name in &self.options.virtual_fields {
            self.headers.add(name, true);
        }
        self.fields = vec![String::new(); self.headers.len()];

        if first_row.is_empty() {
            self.eof = true;
        } else if from_header {
            self.header_raw = Some(self.tokenizer.raw().to_string());
            self.tokenizer.clear_raw();
        } else {
            self.pending_first = Some(first_row);
        }

        debug!(
            "Discovered {} columns ({} virtual), header line: {}",
            self.headers.len(),
            self.virtual_field_count(),
            from_header
        );
        Ok(())
    }

    /// Advance to the next record.
    ///
    /// Returns `false` at the end of the input. With `skip_blank_lines`,
    /// records without fields are passed over.
    pub fn read(&mut self) -> Result<bool> {
        self.initialize()?;

        if let Some(first) = self.pending_first.take() {
            let count = first.len();
            for (slot, value) in self.fields.iter_mut().zip(first) {
                *slot = value;
            }
            self.finish_record(count);
            return Ok(true);
        }

        loop {
            match self.read_record()? {
                None => return Ok(false),
                Some(0) if self.options.skip_blank_lines => continue,
                Some(count) => {
                    self.finish_record(count);
                    return Ok(true);
                }
            }
        }
    }

    /// Fill the record buffer; `None` once nothing is left.
    fn read_record(&mut self) -> Result<Option<usize>> {
        if self.eof {
            return Ok(None);
        }
        self.tokenizer.clear_raw();

        let mut count = 0;
        let end = loop {
            let end = self.tokenizer.read_field(&mut self.scratch)?;
            if count < self.csv_field_count {
                let slot = &mut self.fields[count];
                slot.clear();
                slot.push_str(&self.scratch);
            }
            if end == FieldEnd::Field || count != 0 || !self.scratch.is_empty() {
                count += 1;
            }
            if end != FieldEnd::Field {
                break end;
            }
        };

        for slot in self.fields.iter_mut().skip(count.min(self.csv_field_count)) {
            slot.clear();
        }

        if end == FieldEnd::Stream && count == 0 {
            self.eof = true;
            return Ok(None);
        }
        Ok(Some(count))
    }

    fn finish_record(&mut self, count: usize) {
        self.record_field_count = count;
        self.records_read += 1;
        if self.is_shape_mismatch() {
            debug!(
                "Record {} has {} fields, expected {}",
                self.records_read, count, self.csv_field_count
            );
        }
        trace!("Record {}: {:?}", self.records_read, self.tokenizer.raw());
    }

    /// Field text of the current record. Virtual columns have no text.
    pub fn raw(&self, ordinal: usize) -> Result<&str> {
        self.headers.get(ordinal)?;
        Ok(&self.fields[ordinal])
    }

    /// Value of the current record, coerced to the column's declared type.
    ///
    /// Virtual columns come from the resolver (or `Null` without one). An
    /// empty field is `Null` whatever its type. Otherwise the parse hook is
    /// asked first, then the built-in invariant coercion applies.
    pub fn value(&self, ordinal: usize) -> Result<Value> {
        let column = self.headers.get(ordinal)?;
        if column.is_virtual() {
            return Ok(self
                .resolver
                .as_ref()
                .map_or(Value::Null, |resolver| resolver.resolve(column)));
        }

        let raw = &self.fields[ordinal];
        if raw.is_empty() {
            return Ok(Value::Null);
        }
        if let Some(hook) = &self.parse_hook {
            if let Some(value) = hook(column, raw) {
                return Ok(value);
            }
        }

        coerce(raw, column.column_type).ok_or_else(|| CsvError::Conversion {
            column: column.name().to_string(),
            value: raw.clone(),
            target: column.column_type,
        })
    }

    /// Coerced values of every column of the current record
    pub fn values(&self) -> Result<Vec<Value>> {
        (0..self.headers.len()).map(|i| self.value(i)).collect()
    }

    /// Field text of the real columns of the current record; valid until
    /// the next `read`
    pub fn record(&self) -> &[String] {
        &self.fields[..self.csv_field_count]
    }

    pub fn headers(&self) -> &HeaderRegistry {
        &self.headers
    }

    /// Snapshot of the options taken when the reader was opened
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn set_column_type(&mut self, ordinal: usize, column_type: ColumnType) -> Result<()> {
        self.headers.set_type(ordinal, column_type)
    }

    pub fn set_column_type_by_name(&mut self, name: &str, column_type: ColumnType) -> Result<()> {
        let ordinal = self.headers.ordinal(name)?;
        self.headers.set_type(ordinal, column_type)
    }

    pub fn set_parse_hook(&mut self, hook: Option<ParseHook>) {
        self.parse_hook = hook;
    }

    pub fn name(&self, ordinal: usize) -> Result<&str> {
        Ok(self.headers.get(ordinal)?.name())
    }

    pub fn ordinal(&self, name: &str) -> Result<usize> {
        self.headers.ordinal(name)
    }

    pub fn is_virtual(&self, ordinal: usize) -> Result<bool> {
        Ok(self.headers.get(ordinal)?.is_virtual())
    }

    /// Real plus virtual columns
    pub fn field_count(&self) -> usize {
        self.headers.len()
    }

    /// Columns backed by text
    pub fn csv_field_count(&self) -> usize {
        self.csv_field_count
    }

    pub fn virtual_field_count(&self) -> usize {
        self.headers.len() - self.csv_field_count
    }

    /// Fields actually parsed for the current record
    pub fn record_field_count(&self) -> usize {
        self.record_field_count
    }

    /// The current record has more or fewer fields than there are columns
    pub fn is_shape_mismatch(&self) -> bool {
        self.record_field_count != self.csv_field_count
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Original text of the current record without its terminator
    pub fn raw_record(&self) -> &str {
        self.tokenizer.raw()
    }

    /// Original text of the header line, if one was read
    pub fn header_raw_record(&self) -> Option<&str> {
        self.header_raw.as_deref()
    }

    /// Path the reader was opened from
    pub fn source_name(&self) -> Option<&Path> {
        self.source_name.as_deref()
    }

    pub fn into_inner(self) -> R {
        self.tokenizer.into_inner()
    }
}

impl<R: Read> RecordSource for RecordReader<R> {
    fn read(&mut self) -> Result<bool> {
        RecordReader::read(self)
    }

    fn headers(&self) -> &HeaderRegistry {
        &self.headers
    }

    fn raw(&self, ordinal: usize) -> Result<&str> {
        RecordReader::raw(self, ordinal)
    }

    fn value(&self, ordinal: usize) -> Result<Value> {
        RecordReader::value(self, ordinal)
    }
}
