use std::io::Write;
use std::path::Path;

use tabula_columnar::Table;

use crate::error::{map_csv_error, IngestResult};
use crate::fs::atomic_write;
use crate::options::WriteOptions;

/// Write `table` as delimited text.
///
/// `NA` cells are written as the configured NA string. Doubles keep a
/// trailing `.0` when integral so they read back as doubles. A present cell
/// spelled like the NA string is written as is; see [`WriteOptions::na_string`].
pub fn write_delimited<W: Write>(table: &Table, writer: W, options: &WriteOptions) -> IngestResult<()> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .from_writer(writer);

    if options.header {
        out.write_record(table.names())
            .map_err(|e| map_csv_error(e, 1, 0))?;
    }

    let offset = u64::from(options.header);
    let mut record: Vec<String> = Vec::with_capacity(table.column_count());
    let mut warned = false;
    for row in table.rows() {
        record.clear();
        for value in row.to_vec() {
            match value.to_text() {
                Some(text) => {
                    if !warned && text == options.na_string {
                        log::warn!(
                            "row {}: `{text}` is also the NA token and will read back as NA",
                            row.index() + 1
                        );
                        warned = true;
                    }
                    record.push(text);
                }
                None => record.push(options.na_string.clone()),
            }
        }
        out.write_record(&record)
            .map_err(|e| map_csv_error(e, row.index() as u64 + 1 + offset, 0))?;
    }
    out.flush()?;
    Ok(())
}

/// Atomically write `table` to `path`; an existing file is replaced only once
/// the new contents are fully written.
pub fn write_delimited_file(
    table: &Table,
    path: impl AsRef<Path>,
    options: &WriteOptions,
) -> IngestResult<()> {
    let path = path.as_ref();
    atomic_write(path, |file| write_delimited(table, file, options))?;
    log::debug!(
        "wrote {} rows to {}",
        table.row_count(),
        path.display()
    );
    Ok(())
}
