use tabula_columnar::{ColumnSchema, Table};

use crate::assemble::RowAssembler;
use crate::error::{IngestError, IngestResult};
use crate::options::ParseOptions;
use crate::schema::SampleSource;

/// Column-major buffer of raw text tokens for a rectangular source.
///
/// Rows are buffered whole so types can be settled before any token is parsed.
#[derive(Clone, Debug, Default)]
pub struct RawColumns {
    names: Vec<String>,
    columns: Vec<Vec<String>>,
    /// 1-based source row of each buffered row, for error reporting.
    source_rows: Vec<usize>,
}

impl RawColumns {
    pub fn new(names: Vec<String>) -> Self {
        let columns = names.iter().map(|_| Vec::new()).collect();
        Self {
            names,
            columns,
            source_rows: Vec::new(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn row_count(&self) -> usize {
        self.source_rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.names.len()
    }

    pub fn push_row(&mut self, source_row: usize, fields: Vec<String>) -> IngestResult<()> {
        if fields.len() != self.columns.len() {
            return Err(IngestError::RaggedRow {
                row: source_row,
                expected: self.columns.len(),
                actual: fields.len(),
            });
        }
        for (column, field) in self.columns.iter_mut().zip(fields) {
            column.push(field);
        }
        self.source_rows.push(source_row);
        Ok(())
    }

    pub fn source_row(&self, row: usize) -> usize {
        self.source_rows[row]
    }

    /// Tokens of buffered row `row`, in column order, written into `out`.
    pub fn row_into<'a>(&'a self, row: usize, out: &mut Vec<&'a str>) {
        out.clear();
        out.extend(self.columns.iter().map(|c| c[row].as_str()));
    }

    /// Parse every buffered row under `schema`.
    pub fn assemble(&self, schema: &[ColumnSchema], options: &ParseOptions) -> IngestResult<Table> {
        let mut assembler = RowAssembler::with_capacity(schema, self.row_count(), options)?;
        let mut tokens = Vec::with_capacity(self.column_count());
        for row in 0..self.row_count() {
            self.row_into(row, &mut tokens);
            assembler.push_tokens(self.source_row(row), &tokens)?;
        }
        assembler.finish()
    }
}

impl SampleSource for RawColumns {
    fn tokens(&self, column: usize) -> Box<dyn Iterator<Item = &str> + '_> {
        self.columns.as_slice().tokens(column)
    }
}
