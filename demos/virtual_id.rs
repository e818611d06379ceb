//! Print a semicolon file as a table with a computed `Id` column.
//!
//! Usage: `cargo run --example virtual_id [FILE]`; without a file a small
//! built-in sample is used.

use anyhow::{Context, Result};
use emx_csvdata::{Column, ReaderBuilder, ReaderOptions, RecordSource, Value};
use std::cell::Cell;
use std::io::{Cursor, Read, Seek};
use std::rc::Rc;

const SAMPLE: &str = "Name;Age;City\r\nAnn;34;Oslo\r\nBob;27;\"Rio de Janeiro\"\r\n\r\nChloé;41;Lyon\r\n";

fn main() -> Result<()> {
    let options = ReaderOptions::new()
        .with_delimiter(";")
        .with_quote(Some('"'))
        .with_header(true)
        .with_virtual_fields(["Id"]);

    match std::env::args().nth(1) {
        Some(path) => {
            println!("{}", path);
            let file = std::fs::File::open(&path).with_context(|| format!("Failed to open: {}", path))?;
            print_table(file, &options)
        }
        None => print_table(Cursor::new(SAMPLE), &options),
    }
}

fn print_table<R: Read + Seek>(stream: R, options: &ReaderOptions) -> Result<()> {
    let sequence = Rc::new(Cell::new(0i32));
    let current = Rc::clone(&sequence);

    let mut reader = ReaderBuilder::new(options)
        .resolver(move |column: &Column| match column.name() {
            "Id" => Value::Int32(current.get()),
            _ => Value::Null,
        })
        .open(stream)?;

    let rule = "-".repeat(45);
    println!("{}", rule);
    println!(
        "|{:<5}|{:<15}|{:<5}|{:<15}|",
        reader.headers().by_name("Id")?.name(),
        reader.headers().by_name("Name")?.name(),
        reader.headers().get(1)?.name(),
        reader.headers().by_name("City")?.name()
    );
    println!("{}", rule);

    while reader.read()? {
        sequence.set(sequence.get() + 1);
        println!(
            "|{:>5}|{:<15}|{:>5}|{:<15}|",
            reader.value_by_name("Id")?.to_string(),
            reader.raw(0)?,
            reader.raw(1)?,
            reader.raw(2)?
        );
    }

    println!("{}", rule);
    Ok(())
}
