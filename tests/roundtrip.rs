use emx_csvdata::{
    ColumnType, CsvError, ReaderBuilder, ReaderOptions, RecordReader, RecordSource, RecordWriter,
    Value, WriterOptions,
};
use std::fs;
use std::io::{Cursor, Write};
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(content).unwrap();
    path
}

#[test]
fn test_open_path_records_source_name() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "people.csv", b"Name;Age\nAnn;34\nBob;27\n");

    let mut reader = RecordReader::from_path(&path, &ReaderOptions::default()).unwrap();
    assert_eq!(reader.source_name(), Some(path.as_path()));

    reader.set_column_type_by_name("Age", ColumnType::Int32).unwrap();
    let mut ages = Vec::new();
    while reader.read().unwrap() {
        ages.push(reader.value_by_name("Age").unwrap());
    }
    assert_eq!(ages, vec![Value::Int32(34), Value::Int32(27)]);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result = RecordReader::from_path(dir.path().join("absent.csv"), &ReaderOptions::default());
    assert!(matches!(result, Err(CsvError::Io(_))));
}

#[test]
fn test_multi_source_over_files() {
    let dir = TempDir::new().unwrap();
    let first = write_file(&dir, "a.csv", b"Id;Name\n1;Ann\n2;Bob\n");
    let second = write_file(&dir, "b.csv", b"\xEF\xBB\xBFCode\r\nX\r\n");

    let options = ReaderOptions::default();
    let mut reader = ReaderBuilder::new(&options).open_paths([&first, &second]).unwrap();

    assert_eq!(reader.source_name(), Some(first.as_path()));
    let mut names = Vec::new();
    while reader.read().unwrap() {
        names.push(reader.raw_by_name("Name").unwrap().to_string());
    }
    assert_eq!(names, vec!["Ann", "Bob"]);

    assert!(reader.advance_source().unwrap());
    assert_eq!(reader.source_name(), Some(second.as_path()));
    assert_eq!(reader.headers().names().collect::<Vec<_>>(), vec!["Code"]);
    assert!(reader.read().unwrap());
    assert_eq!(reader.raw(0).unwrap(), "X");
    assert!(!reader.read().unwrap());
    assert!(!reader.advance_source().unwrap());
}

#[test]
fn test_writer_output_reads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.csv");
    let tricky = "a;b \"quoted\"\r\nnext\nline\u{85}end";

    let options = WriterOptions::new().with_headers(["Key", "Text", "Key"]);
    {
        let mut writer = RecordWriter::create(&path, &options).unwrap();
        writer.write(&["1", tricky, "x"]).unwrap();
        writer.write(&["2"]).unwrap();
        writer.write(&["3", "", "y", "ignored"]).unwrap();
        writer.flush().unwrap();
    }

    let mut reader = RecordReader::from_path(&path, &ReaderOptions::default()).unwrap();
    assert_eq!(reader.headers().names().collect::<Vec<_>>(), vec!["Key", "Text", "Key_1"]);

    assert!(reader.read().unwrap());
    assert_eq!(reader.record(), ["1", tricky, "x"]);
    assert!(reader.read().unwrap());
    assert_eq!(reader.record(), ["2", "", ""]);
    assert_eq!(reader.record_field_count(), 3);
    assert!(reader.read().unwrap());
    assert_eq!(reader.record(), ["3", "", "y"]);
    assert!(!reader.read().unwrap());
}

#[test]
fn test_short_record_against_wide_header() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "short.csv", b"A;B;C;D\n1;2\n");

    let mut reader = RecordReader::from_path(&path, &ReaderOptions::default()).unwrap();
    assert!(reader.read().unwrap());
    assert_eq!(reader.record_field_count(), 2);
    assert!(reader.is_shape_mismatch());
    assert_eq!(reader.raw(1).unwrap(), "2");
    assert_eq!(reader.raw(3).unwrap(), "");
    assert_eq!(reader.value(3).unwrap(), Value::Null);
    assert_eq!(reader.raw_record(), "1;2");
}

#[test]
fn test_windows_1251_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cp1251.csv");

    let writer_options = WriterOptions::new()
        .with_encoding(encoding_rs::WINDOWS_1251)
        .with_headers(["Город"]);
    let mut writer = RecordWriter::create(&path, &writer_options).unwrap();
    writer.write(&["Москва"]).unwrap();
    writer.into_inner().unwrap();

    let reader_options = ReaderOptions::new().with_encoding_label("windows-1251").unwrap();
    let mut reader = RecordReader::from_path(&path, &reader_options).unwrap();
    assert!(reader.read().unwrap());
    assert_eq!(reader.raw_by_name("Город").unwrap(), "Москва");
}

#[test]
fn test_multi_char_delimiter_round_trip() {
    let fields = ["a:", ":b", "::", "x:y", "", "\"q\""];
    let options = WriterOptions::new()
        .with_delimiter("::")
        .with_headers(["A", "B", "C", "D", "E", "F"]);
    let mut writer = RecordWriter::new(Vec::new(), &options).unwrap();
    writer.write(&fields).unwrap();
    let bytes = writer.into_inner().unwrap();

    let reader_options = ReaderOptions::new().with_delimiter("::");
    let mut reader = RecordReader::open(Cursor::new(bytes), &reader_options).unwrap();
    assert!(reader.read().unwrap());
    assert_eq!(reader.record(), fields);
    assert!(!reader.is_shape_mismatch());
}

#[test]
fn test_forced_quotes_with_short_record_reads_back() {
    let options = WriterOptions::new().with_headers(["A", "B", "C"]).with_force_quotes(true);
    let mut writer = RecordWriter::new(Vec::new(), &options).unwrap();
    writer.write(&["x"]).unwrap();
    let bytes = writer.into_inner().unwrap();
    assert_eq!(bytes, b"\"A\";\"B\";\"C\"\r\n\"x\";;");

    let mut reader = RecordReader::open(Cursor::new(bytes), &ReaderOptions::default()).unwrap();
    assert!(reader.read().unwrap());
    assert_eq!(reader.record(), ["x", "", ""]);
}
