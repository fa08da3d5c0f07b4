//! A small column-named table of optional string cells.
//!
//! Every stage reads and writes these as CSV. A cell is `None` when the CSV
//! field is empty or holds one of the usual missing-value tokens.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use tracing::debug;

use crate::error::{EvalError, Result};

/// Tokens read as a missing cell, in addition to the empty string.
const MISSING_TOKENS: &[&str] = &["NaN", "nan", "NA", "N/A", "null", "NULL", "None"];

pub type Row = Vec<Option<String>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table from literal string rows. Empty strings become missing cells.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: &[&[&str]],
    ) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row.iter().map(|cell| parse_cell(cell)).collect());
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Resolves the indices of `names`, failing with a schema error that
    /// lists every missing column at once.
    pub fn require(&self, source_name: &str, names: &[&str]) -> Result<Vec<usize>> {
        let mut indices = Vec::with_capacity(names.len());
        let mut missing = Vec::new();

        for name in names {
            match self.column_index(name) {
                Some(idx) => indices.push(idx),
                None => missing.push(name.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(indices)
        } else {
            Err(EvalError::schema(source_name, missing, &self.columns))
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Appends a row, padding or truncating it to the table width.
    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn retain_rows(&mut self, mut keep: impl FnMut(&Row) -> bool) {
        self.rows.retain(|row| keep(row));
    }

    /// Values of one column, in row order.
    pub fn column_values(&self, col: usize) -> impl Iterator<Item = Option<&str>> {
        self.rows.iter().map(move |row| row.get(col).and_then(|c| c.as_deref()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut table = Self::new(columns);

        for record in rdr.records() {
            let record = record?;
            table.push_row(record.iter().map(parse_cell).collect());
        }

        Ok(table)
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let table = Self::from_reader(file)?;
        debug!(path = %path.display(), rows = table.len(), "Loaded CSV table");
        Ok(table)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = WriterBuilder::new().from_writer(writer);

        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        wtr.flush()?;

        Ok(())
    }

    /// Writes the table to `path`, creating parent directories as needed.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        self.to_writer(file)?;
        debug!(path = %path.display(), rows = self.len(), "Wrote CSV table");
        Ok(())
    }
}

/// Maps a raw CSV field to a cell, treating blanks and missing tokens as `None`.
pub fn parse_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || MISSING_TOKENS.contains(&trimmed) {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Canonical form of a label so that `1`, `1.0` and ` 1 ` compare equal.
///
/// Integral numbers render without a fractional part, other numbers use the
/// shortest float rendering, anything else is trimmed text.
pub fn normalize_label(value: &str) -> String {
    let trimmed = value.trim();
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        Ok(n) if n.is_finite() => format!("{n}"),
        _ => trimmed.to_string(),
    }
}

pub fn labels_match(a: &str, b: &str) -> bool {
    normalize_label(a) == normalize_label(b)
}
