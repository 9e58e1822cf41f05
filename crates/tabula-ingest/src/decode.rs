use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use std::io::BufRead;

use crate::error::{IngestError, IngestResult};
use crate::options::TextEncoding;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Consume a leading UTF-8 byte order mark, if present.
pub(crate) fn strip_bom<R: BufRead>(reader: &mut R) -> IngestResult<()> {
    let buf = reader.fill_buf()?;
    if buf.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
    }
    Ok(())
}

/// Discard up to `lines` raw lines. Returns how many were actually skipped.
pub(crate) fn skip_lines<R: BufRead>(reader: &mut R, lines: usize) -> IngestResult<usize> {
    let mut buf = Vec::new();
    for skipped in 0..lines {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(skipped);
        }
    }
    if lines > 0 {
        log::debug!("skipped {lines} leading lines");
    }
    Ok(lines)
}

pub(crate) fn decode_field(
    field: &[u8],
    line: u64,
    column: u64,
    encoding: TextEncoding,
) -> IngestResult<Cow<'_, str>> {
    match encoding {
        TextEncoding::Utf8 => std::str::from_utf8(field)
            .map(Cow::Borrowed)
            .map_err(|e| IngestError::Csv {
                line,
                field: column,
                reason: format!("invalid UTF-8: {e}"),
            }),
        TextEncoding::Windows1252 => {
            let (cow, _, _) = WINDOWS_1252.decode(field);
            Ok(cow)
        }
        TextEncoding::Auto => match std::str::from_utf8(field) {
            Ok(s) => Ok(Cow::Borrowed(s)),
            Err(_) => {
                let (cow, _, _) = WINDOWS_1252.decode(field);
                Ok(cow)
            }
        },
    }
}
