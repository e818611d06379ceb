//! Streaming field tokenizer
//!
//! Bytes are decoded block by block into a single character window. Before
//! any probe the window is refilled until at least `max(delimiter length, 2)`
//! characters are available past the cursor (or the stream is exhausted), so
//! a delimiter or a CRLF pair split across two blocks is always seen whole
//! and the underlying stream is never read twice.

use std::io::{ErrorKind, Read};

use encoding_rs::{CoderResult, Decoder, Encoding};
use log::trace;

use crate::dialect::{is_terminator, CR, LF};
use crate::error::Result;

/// Bytes pulled from the stream per refill
pub const BLOCK_SIZE: usize = 1024;

/// How a field ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEnd {
    /// A delimiter follows; more fields belong to this record
    Field,
    /// A line terminator ended the record
    Record,
    /// The stream ran out
    Stream,
}

/// Classification of the character under a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminator {
    None,
    EndOfStream,
    /// Terminator of the given length; only CRLF has length 2
    Found(usize),
}

/// Produces one field at a time from a byte stream.
pub struct FieldTokenizer<R> {
    inner: R,
    decoder: Decoder,
    delimiter: Vec<char>,
    quote: Option<char>,
    block_size: usize,
    /// Scratch block for raw bytes
    bytes: Vec<u8>,
    /// Scratch block for decoded text
    text: String,
    window: Vec<char>,
    cursor: usize,
    lookahead: usize,
    exhausted: bool,
    /// Original text of the current record, terminators excluded
    raw: String,
}

impl<R: Read> FieldTokenizer<R> {
    /// Create a tokenizer. A byte order mark at the start of the stream
    /// takes precedence over `encoding`.
    pub fn new(inner: R, encoding: &'static Encoding, delimiter: &str, quote: Option<char>) -> Self {
        Self::with_block_size(inner, encoding, delimiter, quote, BLOCK_SIZE)
    }

    pub(crate) fn with_block_size(
        inner: R,
        encoding: &'static Encoding,
        delimiter: &str,
        quote: Option<char>,
        block_size: usize,
    ) -> Self {
        let delimiter: Vec<char> = delimiter.chars().collect();
        let block_size = block_size.max(1);
        Self {
            inner,
            decoder: encoding.new_decoder(),
            lookahead: delimiter.len().max(2),
            delimiter,
            quote,
            block_size,
            bytes: vec![0; block_size],
            text: String::with_capacity(block_size),
            window: Vec::with_capacity(block_size * 2),
            cursor: 0,
            exhausted: false,
            raw: String::new(),
        }
    }

    /// Read the next field into `value`, replacing its contents.
    ///
    /// A field that starts with the quote character is quoted: delimiters
    /// and terminators inside it are data, a doubled quote is one literal
    /// quote, and a quote closes the field only when a delimiter, a
    /// terminator or the end of the stream follows it. Any other quote
    /// inside a quoted field is kept literally.
    ///
    /// `FieldEnd::Stream` with an empty `value` means there was nothing
    /// left to read, not an empty trailing field.
    pub fn read_field(&mut self, value: &mut String) -> Result<FieldEnd> {
        value.clear();
        let mut quoted = false;
        let mut at_start = true;

        loop {
            self.fill()?;
            let Some(ch) = self.char_at(0) else {
                return Ok(FieldEnd::Stream);
            };

            if quoted {
                self.consume(ch);
                if Some(ch) != self.quote {
                    value.push(ch);
                    continue;
                }

                self.fill()?;
                if self.char_at(0) == Some(ch) {
                    // Doubled quote
                    self.consume(ch);
                    value.push(ch);
                } else if self.delimiter_at(0) || self.terminator_at(0) != Terminator::None {
                    quoted = false;
                } else {
                    value.push(ch);
                }
                continue;
            }

            if at_start && Some(ch) == self.quote {
                self.consume(ch);
                quoted = true;
                at_start = false;
                continue;
            }
            at_start = false;

            if let Terminator::Found(len) = self.terminator_at(0) {
                self.cursor += len;
                return Ok(FieldEnd::Record);
            }

            if self.delimiter_at(0) {
                self.raw.extend(self.delimiter.iter());
                self.cursor += self.delimiter.len();
                return Ok(FieldEnd::Field);
            }

            self.consume(ch);
            value.push(ch);
        }
    }

    /// Original text accumulated since the last [`clear_raw`](Self::clear_raw)
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn clear_raw(&mut self) {
        self.raw.clear();
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Give back the underlying stream; buffered lookahead is lost
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn consume(&mut self, ch: char) {
        self.raw.push(ch);
        self.cursor += 1;
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.window.get(self.cursor + offset).copied()
    }

    /// Whether the whole delimiter starts `offset` characters past the cursor
    pub(crate) fn delimiter_at(&self, offset: usize) -> bool {
        self.delimiter
            .iter()
            .enumerate()
            .all(|(i, &d)| self.char_at(offset + i) == Some(d))
    }

    pub(crate) fn terminator_at(&self, offset: usize) -> Terminator {
        match self.char_at(offset) {
            None => Terminator::EndOfStream,
            Some(CR) if self.char_at(offset + 1) == Some(LF) => Terminator::Found(2),
            Some(ch) if is_terminator(ch) => Terminator::Found(1),
            Some(_) => Terminator::None,
        }
    }

    /// Make sure the probes have their lookahead available
    fn fill(&mut self) -> Result<()> {
        while self.window.len() - self.cursor < self.lookahead && !self.exhausted {
            self.refill()?;
        }
        Ok(())
    }

    fn refill(&mut self) -> Result<()> {
        if self.cursor >= self.block_size {
            self.window.drain(..self.cursor);
            self.cursor = 0;
        }

        let n = loop {
            match self.inner.read(&mut self.bytes) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        let last = n == 0;

        self.text.clear();
        if let Some(needed) = self.decoder.max_utf8_buffer_length(n) {
            self.text.reserve(needed);
        }
        let mut input = &self.bytes[..n];
        loop {
            let (result, read, _) = self.decoder.decode_to_string(input, &mut self.text, last);
            input = &input[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => self.text.reserve(input.len() * 3 + 4),
            }
        }

        self.window.extend(self.text.chars());
        if last {
            self.exhausted = true;
        }
        trace!("refilled {} bytes, {} chars buffered", n, self.window.len() - self.cursor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize_with(input: &[u8], delimiter: &str, quote: Option<char>, block_size: usize) -> Vec<(String, FieldEnd)> {
        let mut tokenizer =
            FieldTokenizer::with_block_size(input, encoding_rs::UTF_8, delimiter, quote, block_size);
        let mut fields = Vec::new();
        let mut value = String::new();
        loop {
            let end = tokenizer.read_field(&mut value).unwrap();
            fields.push((value.clone(), end));
            if end == FieldEnd::Stream {
                return fields;
            }
        }
    }

    /// Tokenize with the default block size and a few tiny ones, which
    /// must all agree.
    fn tokenize(input: &str, delimiter: &str, quote: Option<char>) -> Vec<(String, FieldEnd)> {
        let expected = tokenize_with(input.as_bytes(), delimiter, quote, BLOCK_SIZE);
        for block_size in [1, 2, 3, 7] {
            assert_eq!(
                tokenize_with(input.as_bytes(), delimiter, quote, block_size),
                expected,
                "block size {}",
                block_size
            );
        }
        expected
    }

    fn f(value: &str, end: FieldEnd) -> (String, FieldEnd) {
        (value.to_string(), end)
    }

    use FieldEnd::{Field, Record, Stream};

    #[test]
    fn test_simple_records() {
        let fields = tokenize("a;b\nc;d", ";", Some('"'));
        assert_eq!(
            fields,
            vec![f("a", Field), f("b", Record), f("c", Field), f("d", Stream)]
        );
    }

    #[test]
    fn test_every_terminator_ends_one_record() {
        let fields = tokenize("a\nb\rc\r\nd\u{85}e\u{2028}f\u{2029}g", ";", Some('"'));
        assert_eq!(
            fields,
            vec![
                f("a", Record),
                f("b", Record),
                f("c", Record),
                f("d", Record),
                f("e", Record),
                f("f", Record),
                f("g", Stream),
            ]
        );
    }

    #[test]
    fn test_crlf_consumes_two_characters() {
        let fields = tokenize("a\r\n\r\nb\n\rc", ";", None);
        assert_eq!(
            fields,
            vec![
                f("a", Record),
                f("", Record),
                f("b", Record),
                f("", Record),
                f("c", Stream),
            ]
        );
    }

    #[test]
    fn test_trailing_terminator_then_empty_stream() {
        let fields = tokenize("a;b\r\n", ";", Some('"'));
        assert_eq!(fields, vec![f("a", Field), f("b", Record), f("", Stream)]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(tokenize("", ";", Some('"')), vec![f("", Stream)]);
    }

    #[test]
    fn test_multi_char_delimiter() {
        let fields = tokenize("a::b:c::d", "::", Some('"'));
        assert_eq!(fields, vec![f("a", Field), f("b:c", Field), f("d", Stream)]);
    }

    #[test]
    fn test_multi_char_delimiter_not_split() {
        let fields = tokenize("a:::b", "::", None);
        assert_eq!(fields, vec![f("a", Field), f(":b", Stream)]);

        let fields = tokenize("x<=>y<=z", "<=>", None);
        assert_eq!(fields, vec![f("x", Field), f("y<=z", Stream)]);
    }

    #[test]
    fn test_doubled_quote() {
        let fields = tokenize("\"a\"\"b\";c", ";", Some('"'));
        assert_eq!(fields, vec![f("a\"b", Field), f("c", Stream)]);
    }

    #[test]
    fn test_quoted_field_with_delimiter_and_terminators() {
        let fields = tokenize("\"x;y\r\nz\";w\n", ";", Some('"'));
        assert_eq!(fields, vec![f("x;y\r\nz", Field), f("w", Record), f("", Stream)]);
    }

    #[test]
    fn test_empty_quoted_fields() {
        let fields = tokenize("\"\";\"\"\n", ";", Some('"'));
        assert_eq!(fields, vec![f("", Field), f("", Record), f("", Stream)]);
    }

    #[test]
    fn test_quote_before_multi_char_delimiter() {
        let fields = tokenize("\"a:b\"::\"c\"", "::", Some('"'));
        assert_eq!(fields, vec![f("a:b", Field), f("c", Stream)]);
    }

    #[test]
    fn test_stray_quote_inside_quoted_field_is_literal() {
        let fields = tokenize("\"a\"b\";c", ";", Some('"'));
        assert_eq!(fields, vec![f("a\"b", Field), f("c", Stream)]);
    }

    #[test]
    fn test_quote_inside_unquoted_field_is_literal() {
        let fields = tokenize("ab\"c;d", ";", Some('"'));
        assert_eq!(fields, vec![f("ab\"c", Field), f("d", Stream)]);
    }

    #[test]
    fn test_unterminated_quote_runs_to_end() {
        let fields = tokenize("\"abc;\ndef", ";", Some('"'));
        assert_eq!(fields, vec![f("abc;\ndef", Stream)]);
    }

    #[test]
    fn test_quoting_disabled() {
        let fields = tokenize("\"a;b\"", ";", None);
        assert_eq!(fields, vec![f("\"a", Field), f("b\"", Stream)]);
    }

    #[test]
    fn test_multibyte_characters_across_blocks() {
        let fields = tokenize("é::ü\u{2028}日本::€", "::", Some('"'));
        assert_eq!(
            fields,
            vec![f("é", Field), f("ü", Record), f("日本", Field), f("€", Stream)]
        );
    }

    #[test]
    fn test_raw_record_keeps_quotes_and_delimiters() {
        let input = "\"a;b\"::c\r\nnext";
        let mut tokenizer = FieldTokenizer::with_block_size(input.as_bytes(), encoding_rs::UTF_8, "::", Some('"'), 2);
        let mut value = String::new();

        assert_eq!(tokenizer.read_field(&mut value).unwrap(), Field);
        assert_eq!(tokenizer.read_field(&mut value).unwrap(), Record);
        assert_eq!(tokenizer.raw(), "\"a;b\"::c");

        tokenizer.clear_raw();
        assert_eq!(tokenizer.read_field(&mut value).unwrap(), Stream);
        assert_eq!(value, "next");
        assert_eq!(tokenizer.raw(), "next");
    }

    #[test]
    fn test_quoted_terminator_kept_in_raw() {
        let mut tokenizer = FieldTokenizer::new("\"a\nb\"\n".as_bytes(), encoding_rs::UTF_8, ";", Some('"'));
        let mut value = String::new();
        assert_eq!(tokenizer.read_field(&mut value).unwrap(), Record);
        assert_eq!(value, "a\nb");
        assert_eq!(tokenizer.raw(), "\"a\nb\"");
    }

    #[test]
    fn test_bom_is_stripped() {
        let input = b"\xEF\xBB\xBFa;b";
        let fields = tokenize_with(input, ";", None, 1);
        assert_eq!(fields, vec![f("a", Field), f("b", Stream)]);
    }

    #[test]
    fn test_single_byte_encoding() {
        // "При;вет" in windows-1251
        let input: &[u8] = &[0xCF, 0xF0, 0xE8, b';', 0xE2, 0xE5, 0xF2];
        let mut tokenizer = FieldTokenizer::new(input, encoding_rs::WINDOWS_1251, ";", None);
        let mut value = String::new();

        assert_eq!(tokenizer.read_field(&mut value).unwrap(), Field);
        assert_eq!(value, "При");
        assert_eq!(tokenizer.read_field(&mut value).unwrap(), Stream);
        assert_eq!(value, "вет");
    }

    #[test]
    fn test_probes() {
        let mut tokenizer = FieldTokenizer::new("\r\nx".as_bytes(), encoding_rs::UTF_8, "\r", None);
        tokenizer.fill().unwrap();
        assert_eq!(tokenizer.terminator_at(0), Terminator::Found(2));
        assert_eq!(tokenizer.terminator_at(1), Terminator::Found(1));
        assert_eq!(tokenizer.terminator_at(2), Terminator::None);
        assert_eq!(tokenizer.terminator_at(3), Terminator::EndOfStream);
        assert!(tokenizer.delimiter_at(0));
        assert!(!tokenizer.delimiter_at(2));
    }

    #[test]
    fn test_io_error_propagates() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::Other, "boom"))
            }
        }

        let mut tokenizer = FieldTokenizer::new(Broken, encoding_rs::UTF_8, ";", None);
        let mut value = String::new();
        assert!(matches!(
            tokenizer.read_field(&mut value),
            Err(crate::error::CsvError::Io(_))
        ));
    }
}
