//! Several sources behind one cursor

use std::io::Read;
use std::path::Path;

use log::info;

use crate::column::ColumnType;
use crate::error::{CsvError, Result};
use crate::headers::HeaderRegistry;
use crate::reader::{ParseHook, RecordReader, RecordSource};
use crate::value::Value;

/// Sequences readers over several sources, one at a time.
///
/// All readers are opened up front; a reader discovers its columns only
/// when [`advance_source`](Self::advance_source) makes it current. The
/// virtual column resolver is shared by every reader. Dropping the
/// composite drops every reader, visited or not.
pub struct MultiSourceReader<R> {
    readers: Vec<RecordReader<R>>,
    current: usize,
}

impl<R: Read> MultiSourceReader<R> {
    pub(crate) fn from_readers(mut readers: Vec<RecordReader<R>>) -> Result<Self> {
        let first = readers.first_mut().ok_or(CsvError::NoSources)?;
        first.initialize()?;
        Ok(Self { readers, current: 0 })
    }

    /// Make the next source current and discover its columns.
    ///
    /// Returns `false` (and stays put) when the last source is current.
    pub fn advance_source(&mut self) -> Result<bool> {
        if self.current + 1 >= self.readers.len() {
            return Ok(false);
        }
        self.current += 1;

        let reader = &mut self.readers[self.current];
        match reader.source_name() {
            Some(path) => info!("Advancing to source {}: {}", self.current, path.display()),
            None => info!("Advancing to source {}", self.current),
        }
        reader.initialize()?;
        Ok(true)
    }

    pub fn current(&self) -> &RecordReader<R> {
        &self.readers[self.current]
    }

    pub fn current_mut(&mut self) -> &mut RecordReader<R> {
        &mut self.readers[self.current]
    }

    /// Zero-based index of the current source
    pub fn source_index(&self) -> usize {
        self.current
    }

    pub fn source_count(&self) -> usize {
        self.readers.len()
    }

    pub fn read(&mut self) -> Result<bool> {
        self.current_mut().read()
    }

    pub fn raw(&self, ordinal: usize) -> Result<&str> {
        self.current().raw(ordinal)
    }

    pub fn value(&self, ordinal: usize) -> Result<Value> {
        self.current().value(ordinal)
    }

    pub fn values(&self) -> Result<Vec<Value>> {
        self.current().values()
    }

    pub fn record(&self) -> &[String] {
        self.current().record()
    }

    pub fn headers(&self) -> &HeaderRegistry {
        self.current().headers()
    }

    pub fn set_column_type(&mut self, ordinal: usize, column_type: ColumnType) -> Result<()> {
        self.current_mut().set_column_type(ordinal, column_type)
    }

    /// Install `hook` on every source
    pub fn set_parse_hook(&mut self, hook: Option<ParseHook>) {
        for reader in &mut self.readers {
            reader.set_parse_hook(hook.clone());
        }
    }

    pub fn field_count(&self) -> usize {
        self.current().field_count()
    }

    pub fn csv_field_count(&self) -> usize {
        self.current().csv_field_count()
    }

    pub fn record_field_count(&self) -> usize {
        self.current().record_field_count()
    }

    pub fn is_shape_mismatch(&self) -> bool {
        self.current().is_shape_mismatch()
    }

    /// Records read from the current source
    pub fn records_read(&self) -> u64 {
        self.current().records_read()
    }

    pub fn raw_record(&self) -> &str {
        self.current().raw_record()
    }

    pub fn header_raw_record(&self) -> Option<&str> {
        self.current().header_raw_record()
    }

    pub fn source_name(&self) -> Option<&Path> {
        self.current().source_name()
    }

    /// Give back every stream in source order
    pub fn into_inner(self) -> Vec<R> {
        self.readers.into_iter().map(RecordReader::into_inner).collect()
    }
}

impl<R: Read> RecordSource for MultiSourceReader<R> {
    fn read(&mut self) -> Result<bool> {
        MultiSourceReader::read(self)
    }

    fn headers(&self) -> &HeaderRegistry {
        MultiSourceReader::headers(self)
    }

    fn raw(&self, ordinal: usize) -> Result<&str> {
        MultiSourceReader::raw(self, ordinal)
    }

    fn value(&self, ordinal: usize) -> Result<Value> {
        MultiSourceReader::value(self, ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::dialect::ReaderOptions;
    use crate::reader::ReaderBuilder;
    use std::cell::Cell;
    use std::io::Cursor;
    use std::rc::Rc;

    fn sources(inputs: &[&str]) -> Vec<Cursor<Vec<u8>>> {
        inputs.iter().map(|s| Cursor::new(s.as_bytes().to_vec())).collect()
    }

    #[test]
    fn test_sources_are_sequenced_on_request() {
        let options = ReaderOptions::default();
        let mut reader = ReaderBuilder::new(&options)
            .open_many(sources(&["A;B\n1;2\n3;4", "C\nx\ny\nz"]))
            .unwrap();

        assert_eq!(reader.source_count(), 2);
        assert_eq!(reader.headers().names().collect::<Vec<_>>(), vec!["A", "B"]);

        let mut rows = 0;
        while reader.read().unwrap() {
            rows += 1;
        }
        assert_eq!(rows, 2);

        assert!(reader.advance_source().unwrap());
        assert_eq!(reader.source_index(), 1);
        assert_eq!(reader.headers().names().collect::<Vec<_>>(), vec!["C"]);
        assert_eq!(reader.header_raw_record(), Some("C"));

        let mut values = Vec::new();
        while reader.read().unwrap() {
            values.push(reader.raw(0).unwrap().to_string());
        }
        assert_eq!(values, vec!["x", "y", "z"]);
        assert_eq!(reader.records_read(), 3);

        assert!(!reader.advance_source().unwrap());
        assert_eq!(reader.source_index(), 1);
    }

    #[test]
    fn test_resolver_follows_current_source() {
        let options = ReaderOptions::new().with_virtual_fields(["Source"]);
        let source = Rc::new(Cell::new(0usize));
        let seen = Rc::clone(&source);

        let mut reader = ReaderBuilder::new(&options)
            .resolver(move |_: &Column| Value::Int64(seen.get() as i64))
            .open_many(sources(&["A\n1", "A\n2"]))
            .unwrap();

        loop {
            source.set(reader.source_index());
            while reader.read().unwrap() {
                let expected = reader.source_index() as i64;
                assert_eq!(reader.value_by_name("Source").unwrap(), Value::Int64(expected));
            }
            if !reader.advance_source().unwrap() {
                break;
            }
        }
    }

    #[test]
    fn test_no_sources() {
        let options = ReaderOptions::default();
        let result = ReaderBuilder::new(&options).open_many(Vec::<Cursor<Vec<u8>>>::new());
        assert!(matches!(result, Err(CsvError::NoSources)));
    }

    #[test]
    fn test_parse_hook_reaches_every_source() {
        let options = ReaderOptions::default();
        let mut reader = ReaderBuilder::new(&options)
            .open_many(sources(&["N\nx", "N\ny"]))
            .unwrap();
        reader.set_parse_hook(Some(Rc::new(|_: &Column, raw: &str| Some(Value::Text(raw.to_uppercase())))));

        assert!(reader.read().unwrap());
        assert_eq!(reader.value(0).unwrap(), Value::Text("X".to_string()));
        assert!(reader.advance_source().unwrap());
        assert!(reader.read().unwrap());
        assert_eq!(reader.value(0).unwrap(), Value::Text("Y".to_string()));
    }

    #[test]
    fn test_into_inner_returns_all_streams() {
        let options = ReaderOptions::default();
        let reader = ReaderBuilder::new(&options)
            .open_many(sources(&["A", "B", "C"]))
            .unwrap();
        assert_eq!(reader.into_inner().len(), 3);
    }
}
