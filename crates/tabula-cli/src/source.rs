use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use tabula_columnar::Table;
use tabula_ingest::{
    parse_widths, read_delimited, read_fixed_width, read_json, CoercionPolicy, ColumnTypeSpec,
    DelimitedOptions, FixedWidthOptions, JsonOptions, ParseOptions, RecordOptions, TypeHint,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Pick from `--widths` or the file extension; falls back to csv.
    Auto,
    Csv,
    Tsv,
    Json,
    /// Fixed-width text; requires `--widths`.
    Fwf,
}

/// How to read the input source.
#[derive(Clone, Debug, Args)]
pub struct SourceArgs {
    /// Input file.
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = Format::Auto)]
    pub format: Format,

    /// Fixed-width columns as `name:width,name:width,...`.
    #[arg(long)]
    pub widths: Option<String>,

    /// Column types: compact codes (`sid?b`) or `name=type,...` pairs.
    /// A `.default=type` pair applies to every unnamed column.
    #[arg(long)]
    pub types: Option<String>,

    /// Token read as a missing value.
    #[arg(long, default_value = "NA")]
    pub na: String,

    /// Raw lines to discard before the header (or first data line).
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Dot-separated object keys to descend into before reading JSON records.
    #[arg(long = "json-path")]
    pub json_path: Option<String>,

    /// Replace cells that fail to parse with NA instead of failing.
    #[arg(long)]
    pub lenient: bool,
}

impl SourceArgs {
    pub fn resolved_format(&self) -> Format {
        if self.format != Format::Auto {
            return self.format;
        }
        if self.widths.is_some() {
            return Format::Fwf;
        }
        let ext = self
            .input
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("tsv" | "tab") => Format::Tsv,
            Some("json") => Format::Json,
            Some("fwf") => Format::Fwf,
            _ => Format::Csv,
        }
    }

    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            na_string: self.na.clone(),
            coercion: if self.lenient {
                CoercionPolicy::NaOnError
            } else {
                CoercionPolicy::Fail
            },
            ..ParseOptions::default()
        }
    }
}

/// Parse the `--types` flag.
pub fn parse_type_spec(text: &str) -> Result<ColumnTypeSpec> {
    if !text.contains('=') {
        return ColumnTypeSpec::compact(text.trim())
            .with_context(|| format!("invalid compact column types `{text}`"));
    }
    let mut entries = Vec::new();
    for pair in text.split(',').filter(|p| !p.trim().is_empty()) {
        let Some((name, ty)) = pair.split_once('=') else {
            bail!("expected `name=type`, found `{pair}`");
        };
        let hint: TypeHint = ty
            .parse()
            .with_context(|| format!("invalid type for column `{}`", name.trim()))?;
        entries.push((name.trim().to_owned(), hint));
    }
    Ok(ColumnTypeSpec::from_map(entries))
}

/// Read the source described by `args` into a table.
pub fn load_table(args: &SourceArgs) -> Result<Table> {
    let column_types = args.types.as_deref().map(parse_type_spec).transpose()?;
    let parse = args.parse_options();
    let path = args.input.as_path();
    let reader = open(path)?;
    let format = args.resolved_format();
    log::debug!("reading {} as {format:?}", path.display());

    let table = match format {
        Format::Csv | Format::Auto => read_delimited(
            reader,
            &DelimitedOptions {
                skip: args.skip,
                column_types,
                parse,
                ..DelimitedOptions::default()
            },
        ),
        Format::Tsv => read_delimited(
            reader,
            &DelimitedOptions {
                skip: args.skip,
                column_types,
                parse,
                ..DelimitedOptions::tsv()
            },
        ),
        Format::Json => read_json(
            reader,
            &JsonOptions {
                path: args
                    .json_path
                    .iter()
                    .flat_map(|p| p.split('.'))
                    .filter(|k| !k.is_empty())
                    .map(str::to_owned)
                    .collect(),
                records: RecordOptions {
                    column_types,
                    parse,
                    ..RecordOptions::default()
                },
            },
        ),
        Format::Fwf => {
            let Some(widths) = args.widths.as_deref() else {
                bail!("fixed-width input needs --widths name:width,...");
            };
            let columns = parse_widths(widths)?;
            read_fixed_width(
                reader,
                &columns,
                &FixedWidthOptions {
                    skip: args.skip,
                    column_types,
                    parse,
                    ..FixedWidthOptions::default()
                },
            )
        }
    };
    table.with_context(|| format!("read {}", path.display()))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_columnar::ColumnType;

    #[test]
    fn type_flags_accept_both_spellings() {
        assert_eq!(
            parse_type_spec("s?d").unwrap(),
            ColumnTypeSpec::Positional(vec![
                TypeHint::Declared(ColumnType::String),
                TypeHint::Infer,
                TypeHint::Declared(ColumnType::Double),
            ])
        );
        let mixed = parse_type_spec("id=long, .default=s").unwrap();
        assert!(matches!(mixed, ColumnTypeSpec::Mixed { default: Some(_), .. }));
        assert!(parse_type_spec("id=decimal").is_err());
        assert!(parse_type_spec("sx").is_err());
    }

    #[test]
    fn format_follows_extension_and_widths() {
        let mut args = SourceArgs {
            input: PathBuf::from("cars.TSV"),
            format: Format::Auto,
            widths: None,
            types: None,
            na: "NA".to_owned(),
            skip: 0,
            json_path: None,
            lenient: false,
        };
        assert_eq!(args.resolved_format(), Format::Tsv);
        args.widths = Some("a:3".to_owned());
        assert_eq!(args.resolved_format(), Format::Fwf);
        args.format = Format::Json;
        assert_eq!(args.resolved_format(), Format::Json);
    }
}
