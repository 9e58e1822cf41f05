use std::io::BufRead;
use tabula_columnar::Table;

use crate::decode::{decode_field, skip_lines, strip_bom};
use crate::error::{IngestError, IngestResult};
use crate::options::FixedWidthOptions;
use crate::raw::RawColumns;
use crate::schema::resolve_schema;

/// One fixed-width field: its column name and width in bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedWidthColumn {
    pub name: String,
    pub width: usize,
}

impl FixedWidthColumn {
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }
}

/// Read fixed-width text into a typed [`Table`].
///
/// There is no header; fields are cut from each line by the declared widths
/// and trimmed. Lines shorter than the declared total width are padded with
/// blanks, and bytes past it are ignored. Empty lines are skipped; a line of
/// blanks is a row of missing cells.
pub fn read_fixed_width<R: BufRead>(
    mut reader: R,
    columns: &[FixedWidthColumn],
    options: &FixedWidthOptions,
) -> IngestResult<Table> {
    strip_bom(&mut reader)?;
    let skipped = skip_lines(&mut reader, options.skip)?;
    let total_width: usize = columns.iter().map(|c| c.width).sum();

    let mut raw = RawColumns::new(columns.iter().map(|c| c.name.clone()).collect());
    let mut line = Vec::new();
    let mut line_no = skipped;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_no += 1;
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        if line.is_empty() {
            continue;
        }
        if line.len() > total_width {
            log::warn!(
                "line {line_no}: ignoring {} bytes past the declared width of {total_width}",
                line.len() - total_width
            );
        }

        let mut fields = Vec::with_capacity(columns.len());
        let mut start = 0;
        for (idx, column) in columns.iter().enumerate() {
            let end = (start + column.width).min(line.len());
            let region = &line[start.min(end)..end];
            let text = decode_field(region, line_no as u64, idx as u64 + 1, options.encoding)?;
            fields.push(text.trim().to_owned());
            start += column.width;
        }
        raw.push_row(line_no, fields)?;
    }

    let schema = resolve_schema(
        raw.names(),
        options.column_types.as_ref(),
        &raw,
        &options.parse,
    )?;
    raw.assemble(&schema, &options.parse)
}

/// Parse a `name:width,name:width` column list.
pub fn parse_widths(text: &str) -> IngestResult<Vec<FixedWidthColumn>> {
    text.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (name, width) = part.rsplit_once(':').ok_or_else(|| IngestError::InvalidWidth {
                entry: part.trim().to_owned(),
            })?;
            let width = width
                .trim()
                .parse()
                .map_err(|_| IngestError::InvalidWidth {
                    entry: part.trim().to_owned(),
                })?;
            Ok(FixedWidthColumn::new(name.trim(), width))
        })
        .collect()
}
