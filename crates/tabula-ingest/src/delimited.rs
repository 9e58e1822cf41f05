use csv::ByteRecord;
use std::collections::VecDeque;
use std::io::{self, BufRead, Read};
use tabula_columnar::Table;

use crate::decode::{decode_field, skip_lines, strip_bom};
use crate::error::{map_csv_error, IngestResult};
use crate::options::{DelimitedOptions, TextEncoding};
use crate::raw::RawColumns;
use crate::schema::resolve_schema;

/// Read delimited text into a typed [`Table`].
///
/// The whole input is buffered, column types are resolved from the buffered
/// tokens, then every row is parsed. Header-less input names its columns
/// `X1..Xn`. Empty input yields an empty table.
///
/// Empty lines are skipped, except in a one-column table where an empty line
/// is a missing cell.
pub fn read_delimited<R: BufRead>(reader: R, options: &DelimitedOptions) -> IngestResult<Table> {
    let raw = buffer_delimited(reader, options)?;
    let schema = resolve_schema(
        raw.names(),
        options.column_types.as_ref(),
        &raw,
        &options.parse,
    )?;
    raw.assemble(&schema, &options.parse)
}

/// Tokenize delimited text into a column-major buffer without parsing.
pub fn buffer_delimited<R: BufRead>(
    mut reader: R,
    options: &DelimitedOptions,
) -> IngestResult<RawColumns> {
    strip_bom(&mut reader)?;
    let skipped = skip_lines(&mut reader, options.skip)? as u64;

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .quote(options.quote)
        .escape(options.escape)
        .double_quote(options.escape.is_none())
        .comment(options.comment)
        .trim(if options.trim {
            csv::Trim::All
        } else {
            csv::Trim::None
        })
        // Headers are handled here so ragged rows report our own error.
        .has_headers(false)
        .flexible(true)
        .from_reader(BlankLines::new(reader, options));

    let mut record = ByteRecord::new();
    let mut raw: Option<RawColumns> = None;
    let mut last_line = skipped;

    loop {
        match csv_reader.read_byte_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {}
            Err(e) => return Err(map_csv_error(e, last_line + 1, skipped)),
        }
        let blank = record.len() == 1 && record[0].is_empty();
        if record.is_empty() || (blank && raw.as_ref().map_or(true, |r| r.column_count() != 1)) {
            continue;
        }
        let line = record.position().map_or(last_line + 1, |p| p.line() + skipped);
        last_line = line;
        let fields = decode_record(&record, line, options.encoding)?;

        if let Some(buffer) = raw.as_mut() {
            buffer.push_row(line as usize, fields)?;
            continue;
        }
        raw = Some(if options.has_header {
            RawColumns::new(fields)
        } else {
            let names = (1..=fields.len()).map(|i| format!("X{i}")).collect();
            let mut buffer = RawColumns::new(names);
            buffer.push_row(line as usize, fields)?;
            buffer
        });
    }

    Ok(raw.unwrap_or_default())
}

/// Rewrites every empty line outside a quoted field as a line holding one
/// empty quoted field, so the csv reader yields a record for it.
struct BlankLines<R> {
    inner: R,
    scan: LineScan,
    pending: VecDeque<u8>,
}

impl<R: BufRead> BlankLines<R> {
    fn new(inner: R, options: &DelimitedOptions) -> Self {
        Self {
            inner,
            scan: LineScan {
                delimiter: options.delimiter,
                quote: options.quote,
                escape: options.escape,
                double_quote: options.escape.is_none(),
                comment: options.comment,
                line_start: true,
                field_start: true,
                after_cr: false,
                quoted: false,
                closed_quote: false,
                escaped: false,
                in_comment: false,
            },
            pending: VecDeque::new(),
        }
    }
}

impl<R: BufRead> Read for BlankLines<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pending.is_empty() {
            let input = self.inner.fill_buf()?;
            if input.is_empty() {
                return Ok(0);
            }
            let consumed = input.len();
            for &byte in input {
                self.scan.feed(byte, &mut self.pending);
            }
            self.inner.consume(consumed);
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// Quote and line tracking, mirroring how the csv reader splits records.
struct LineScan {
    delimiter: u8,
    quote: u8,
    escape: Option<u8>,
    double_quote: bool,
    comment: Option<u8>,
    line_start: bool,
    field_start: bool,
    after_cr: bool,
    quoted: bool,
    closed_quote: bool,
    escaped: bool,
    in_comment: bool,
}

impl LineScan {
    fn feed(&mut self, byte: u8, out: &mut VecDeque<u8>) {
        let after_cr = std::mem::take(&mut self.after_cr);
        let closed_quote = std::mem::take(&mut self.closed_quote);

        if self.quoted {
            if self.escaped {
                self.escaped = false;
            } else if self.escape == Some(byte) {
                self.escaped = true;
            } else if byte == self.quote {
                self.quoted = false;
                self.closed_quote = true;
            }
        } else if self.in_comment {
            if matches!(byte, b'\n' | b'\r') {
                self.in_comment = false;
                self.end_line(byte);
            }
        } else if closed_quote && self.double_quote && byte == self.quote {
            // `""` inside a quoted field.
            self.quoted = true;
        } else {
            match byte {
                b'\n' if after_cr => {}
                b'\n' | b'\r' => {
                    if self.line_start {
                        out.extend([self.quote, self.quote]);
                    }
                    self.end_line(byte);
                }
                _ => {
                    if self.line_start && self.comment == Some(byte) {
                        self.in_comment = true;
                    } else if self.field_start && byte == self.quote {
                        self.quoted = true;
                    }
                    self.line_start = false;
                    self.field_start = byte == self.delimiter;
                }
            }
        }
        out.push_back(byte);
    }

    fn end_line(&mut self, byte: u8) {
        self.line_start = true;
        self.field_start = true;
        self.after_cr = byte == b'\r';
    }
}

fn decode_record(
    record: &ByteRecord,
    line: u64,
    encoding: TextEncoding,
) -> IngestResult<Vec<String>> {
    record
        .iter()
        .enumerate()
        .map(|(idx, field)| Ok(decode_field(field, line, idx as u64 + 1, encoding)?.into_owned()))
        .collect()
}
