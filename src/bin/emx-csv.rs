//! emx-csv CLI
//!
//! Inspect, convert and validate delimited text files.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use emx_csvdata::{
    Column, ColumnType, MultiSourceReader, ReaderBuilder, ReaderOptions, RecordWriter, Value,
    WriterOptions,
};
use std::cell::Cell;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Parser, Debug)]
#[command(name = "emx-csv")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "Delimited text inspection and conversion tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Dialect {
    /// Field delimiter
    #[arg(short, long, default_value = ";")]
    delimiter: String,

    /// Quote character
    #[arg(short, long, default_value_t = '"')]
    quote: char,

    /// Disable quoting
    #[arg(long)]
    no_quote: bool,

    /// The first record is data, not column names
    #[arg(long)]
    no_header: bool,

    /// Report blank lines as empty records
    #[arg(long)]
    keep_blank_lines: bool,

    /// Input encoding label (utf-8, windows-1251, ...)
    #[arg(long, default_value = "utf-8")]
    encoding: String,
}

impl Dialect {
    fn reader_options(&self) -> Result<ReaderOptions> {
        let options = ReaderOptions::new()
            .with_delimiter(self.delimiter.as_str())
            .with_quote(if self.no_quote { None } else { Some(self.quote) })
            .with_header(!self.no_header)
            .with_skip_blank_lines(!self.keep_blank_lines)
            .with_encoding_label(&self.encoding)?;
        options.validate()?;
        Ok(options)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the columns of every input
    Headers {
        /// Files and directories to read
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        dialect: Dialect,
    },

    /// Rewrite all records in another dialect
    Convert {
        /// Files and directories to read
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        dialect: Dialect,

        /// Output delimiter (default: input delimiter)
        #[arg(long)]
        out_delimiter: Option<String>,

        /// Quote every output field
        #[arg(long)]
        force_quotes: bool,

        /// Output file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Append a column with the running record number
        #[arg(long, value_name = "NAME")]
        record_number: Option<String>,
    },

    /// Report malformed records and values that do not parse
    Check {
        /// Files and directories to read
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        dialect: Dialect,

        /// Declare a column type, e.g. `Age=int32`
        #[arg(long = "type", value_name = "NAME=TYPE")]
        types: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Headers { inputs, dialect } => {
            list_headers(&inputs, &dialect)?;
        }
        Commands::Convert { inputs, dialect, out_delimiter, force_quotes, output, record_number } => {
            convert(&inputs, &dialect, out_delimiter, force_quotes, output, record_number)?;
        }
        Commands::Check { inputs, dialect, types } => {
            check(&inputs, &dialect, &types)?;
        }
    }

    Ok(())
}

fn list_headers(inputs: &[PathBuf], dialect: &Dialect) -> Result<()> {
    let mut reader = open_inputs(inputs, ReaderBuilder::new(&dialect.reader_options()?))?;

    loop {
        println!("{}", source_label(reader.source_name()));
        for column in reader.headers() {
            let kind = if column.is_virtual() { "virtual" } else { "field" };
            println!("  {}\t{}\t{}", column.ordinal(), column.name(), kind);
        }
        if !reader.advance_source()? {
            break;
        }
    }

    Ok(())
}

fn convert(
    inputs: &[PathBuf],
    dialect: &Dialect,
    out_delimiter: Option<String>,
    force_quotes: bool,
    output: Option<PathBuf>,
    record_number: Option<String>,
) -> Result<()> {
    let mut options = dialect.reader_options()?;
    if let Some(name) = &record_number {
        options = options.with_virtual_fields([name.as_str()]);
    }

    let counter = Rc::new(Cell::new(0u64));
    let current = Rc::clone(&counter);
    let builder = ReaderBuilder::new(&options).resolver(move |_: &Column| Value::Int64(current.get() as i64));
    let mut reader = open_inputs(inputs, builder)?;

    let out: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create: {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    let mut writer_options = WriterOptions::new()
        .with_delimiter(out_delimiter.unwrap_or_else(|| options.delimiter.clone()))
        .with_quote(options.quote)
        .with_force_quotes(force_quotes)
        .with_encoding(options.encoding)
        .with_line_terminator("\n");
    if options.first_line_is_header {
        writer_options = writer_options.with_headers(reader.headers().names());
    }
    let mut writer = RecordWriter::new(out, &writer_options)?;

    loop {
        while reader.read()? {
            counter.set(counter.get() + 1);
            let mut fields = Vec::with_capacity(reader.field_count());
            for column in reader.headers() {
                let text = if column.is_virtual() {
                    reader.value(column.ordinal())?.to_string()
                } else {
                    reader.raw(column.ordinal())?.to_string()
                };
                fields.push(text);
            }
            writer.write(&fields)?;
        }
        if !reader.advance_source()? {
            break;
        }
    }

    let mut out = writer.into_inner()?;
    if output.is_none() {
        writeln!(out)?;
    }
    out.flush()?;

    if let Some(path) = output {
        eprintln!("Converted {} records into {}", counter.get(), path.display());
    }
    Ok(())
}

fn check(inputs: &[PathBuf], dialect: &Dialect, types: &[String]) -> Result<()> {
    let declared = types
        .iter()
        .map(|decl| parse_type_decl(decl))
        .collect::<Result<Vec<_>>>()?;

    let mut reader = open_inputs(inputs, ReaderBuilder::new(&dialect.reader_options()?))?;
    let mut problems = 0usize;

    loop {
        let label = source_label(reader.source_name());
        let mut typed = Vec::new();
        for (name, column_type) in &declared {
            match reader.current().ordinal(name) {
                Ok(ordinal) => {
                    reader.set_column_type(ordinal, *column_type)?;
                    typed.push(ordinal);
                }
                Err(_) => eprintln!("{}: no column named '{}'", label, name),
            }
        }

        while reader.read()? {
            let record = reader.records_read();
            if reader.is_shape_mismatch() {
                problems += 1;
                println!(
                    "{}:{}: expected {} fields, found {}: {}",
                    label,
                    record,
                    reader.csv_field_count(),
                    reader.record_field_count(),
                    reader.raw_record()
                );
            }
            for &ordinal in &typed {
                if let Err(e) = reader.value(ordinal) {
                    problems += 1;
                    println!("{}:{}: {}", label, record, e);
                }
            }
        }

        if !reader.advance_source()? {
            break;
        }
    }

    if problems > 0 {
        anyhow::bail!("{} problems found", problems);
    }
    println!("OK");
    Ok(())
}

fn parse_type_decl(decl: &str) -> Result<(String, ColumnType)> {
    let (name, type_name) = decl
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected NAME=TYPE, got '{}'", decl))?;
    let column_type = type_name
        .parse::<ColumnType>()
        .with_context(|| format!("Invalid type declaration: {}", decl))?;
    Ok((name.to_string(), column_type))
}

fn source_label(name: Option<&Path>) -> String {
    name.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stream>".to_string())
}

fn open_inputs(inputs: &[PathBuf], builder: ReaderBuilder) -> Result<MultiSourceReader<File>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            collect_directory(&mut paths, input)?;
        } else {
            paths.push(input.clone());
        }
    }
    if paths.is_empty() {
        anyhow::bail!("No input files found");
    }

    builder
        .open_paths(&paths)
        .with_context(|| format!("Failed to open {} input(s)", paths.len()))
}

fn collect_directory(paths: &mut Vec<PathBuf>, dir: &Path) -> Result<()> {
    #[cfg(feature = "walkdir")]
    {
        let mut found = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect::<Vec<_>>();
        found.sort();
        paths.extend(found);
    }

    #[cfg(not(feature = "walkdir"))]
    {
        let _ = (paths, dir);
        anyhow::bail!("Directory traversal requires the 'cli' feature");
    }

    Ok(())
}
