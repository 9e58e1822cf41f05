use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tabula_columnar::{ColumnType, Table};
use tabula_ingest::{write_delimited, write_delimited_file, IngestError, WriteOptions};

use crate::source::{load_table, SourceArgs};

#[derive(Parser)]
#[command(name = "tabula")]
#[command(about = "Inspect and convert delimited, fixed-width and JSON tables.")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print each column's name, resolved type and missing-value count.
    Schema(SchemaArgs),
    /// Print the first rows as delimited text.
    Head(HeadArgs),
    /// Rewrite the source as delimited text.
    Convert(ConvertArgs),
}

#[derive(Args)]
struct SchemaArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Emit the schema as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct HeadArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Number of rows to print.
    #[arg(short = 'n', long = "rows", default_value_t = 10)]
    rows: usize,
}

#[derive(Args)]
struct ConvertArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output file. Written atomically; defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output field delimiter.
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Token written for missing values. Defaults to `--na`.
    #[arg(long = "output-na")]
    output_na: Option<String>,
}

#[derive(Debug, Serialize)]
struct JsonColumn<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    column_type: ColumnType,
    missing: usize,
}

#[derive(Debug, Serialize)]
struct JsonSchema<'a> {
    source: String,
    rows: usize,
    columns: Vec<JsonColumn<'a>>,
}

pub fn run() -> Result<()> {
    run_with_args(Cli::parse())
}

pub fn run_with_args(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Schema(args) => schema(args),
        Command::Head(args) => head(args),
        Command::Convert(args) => convert(args),
    }
}

fn schema(args: SchemaArgs) -> Result<()> {
    let table = load_table(&args.source)?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    let written = if args.json {
        let report = JsonSchema {
            source: args.source.input.to_string_lossy().into_owned(),
            rows: table.row_count(),
            columns: table
                .columns()
                .map(|c| JsonColumn {
                    name: c.name(),
                    column_type: c.column_type(),
                    missing: c.na_count(),
                })
                .collect(),
        };
        serde_json::to_writer_pretty(&mut handle, &report)
            .map_err(io::Error::from)
            .and_then(|()| handle.write_all(b"\n"))
    } else {
        write_schema_text(&mut handle, &table)
    };
    ignore_broken_pipe(written)
}

fn write_schema_text(out: &mut impl Write, table: &Table) -> io::Result<()> {
    writeln!(out, "{} rows", table.row_count())?;
    let width = table.names().iter().map(|n| n.len()).max().unwrap_or(0);
    for column in table.columns() {
        writeln!(
            out,
            "  {:<width$}  {:<8}  {} missing",
            column.name(),
            column.column_type().to_string(),
            column.na_count()
        )?;
    }
    Ok(())
}

fn head(args: HeadArgs) -> Result<()> {
    let table = load_table(&args.source)?.head(args.rows);
    let options = WriteOptions {
        na_string: args.source.na.clone(),
        ..WriteOptions::default()
    };
    let stdout = io::stdout();
    let written = write_delimited(&table, stdout.lock(), &options);
    ignore_broken_pipe(written.map_err(into_io))
}

fn convert(args: ConvertArgs) -> Result<()> {
    let delimiter = u8::try_from(args.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .with_context(|| format!("delimiter `{}` is not a single ASCII character", args.delimiter))?;
    let table = load_table(&args.source)?;
    let options = WriteOptions {
        delimiter,
        na_string: args.output_na.unwrap_or_else(|| args.source.na.clone()),
        header: true,
    };

    match args.output {
        Some(path) => write_delimited_file(&table, &path, &options)
            .with_context(|| format!("write {}", path.display())),
        None => {
            let stdout = io::stdout();
            let written = write_delimited(&table, stdout.lock(), &options);
            ignore_broken_pipe(written.map_err(into_io))
        }
    }
}

fn into_io(err: IngestError) -> io::Error {
    match err {
        IngestError::Io(err) => err,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

/// A reader closing stdout early (`tabula head big.csv | head -1`) is not an error.
fn ignore_broken_pipe(result: io::Result<()>) -> Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => Ok(other?),
    }
}
