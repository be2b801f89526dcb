//! One chain's output file: metadata comments, header, numeric rows.
//!
//! `OutputFile::open` reads the text once and scans comments and the header;
//! rows are only parsed by `read_columns`, and only for the requested columns.

use std::path::{Path, PathBuf};

use drawbridge_core::draws::ChainMetadata;

use super::metadata::MetadataBuilder;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Whitespace,
}

#[derive(Debug)]
pub struct OutputFile {
    pub path: PathBuf,
    pub header: Vec<String>,
    pub delimiter: Delimiter,
    pub metadata: ChainMetadata,
    text: String,
    /// 1-based line number of the header row.
    header_line: u64,
}

/// Parsed values for a set of columns; `values[k]` holds every row of the
/// k-th requested column.
#[derive(Debug, Default)]
pub struct ColumnData {
    pub num_rows: usize,
    pub values: Vec<Vec<f64>>,
}

impl OutputFile {
    pub fn open(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut meta = MetadataBuilder::default();
        let mut header: Option<(u64, Vec<String>, Delimiter)> = None;

        for (i, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let is_comment = trimmed.starts_with('#');
            match (header.is_some(), is_comment) {
                (false, true) => meta.preamble(trimmed),
                (false, false) => {
                    let delimiter = if trimmed.contains(',') {
                        Delimiter::Comma
                    } else {
                        Delimiter::Whitespace
                    };
                    let cols = split_row(trimmed, delimiter)
                        .map(str::to_string)
                        .collect();
                    header = Some((i as u64 + 1, cols, delimiter));
                }
                (true, true) => meta.trailing(trimmed),
                (true, false) => {}
            }
        }

        let Some((header_line, header, delimiter)) = header else {
            return Err(Error::CsvFormat {
                path: path.to_path_buf(),
                line: text.lines().count() as u64,
                reason: "no header row found".into(),
            });
        };
        let mut metadata = meta.finish();
        metadata.path = path.to_path_buf();
        tracing::trace!(path = %path.display(), columns = header.len(), "scanned output header");

        Ok(Self {
            path: path.to_path_buf(),
            header,
            delimiter,
            metadata,
            text,
            header_line,
        })
    }

    /// Parse every data row, keeping only the columns at `wanted` (header
    /// positions). Every row must have exactly one field per header column.
    pub fn read_columns(&self, wanted: &[usize]) -> Result<ColumnData> {
        let mut out = ColumnData {
            num_rows: 0,
            values: vec![Vec::new(); wanted.len()],
        };
        match self.delimiter {
            Delimiter::Comma => self.read_comma_rows(wanted, &mut out)?,
            Delimiter::Whitespace => self.read_whitespace_rows(wanted, &mut out)?,
        }
        Ok(out)
    }

    fn read_comma_rows(&self, wanted: &[usize], out: &mut ColumnData) -> Result<()> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(self.text.as_bytes());

        let mut record = csv::StringRecord::new();
        let mut seen_header = false;
        loop {
            let more = rdr.read_record(&mut record).map_err(|e| Error::Csv {
                path: self.path.clone(),
                source: e,
            })?;
            if !more {
                break;
            }
            // the reader only honors `#` at column 0; `open` also skips
            // indented comments and blank-looking lines, so match it here
            if record.get(0).is_some_and(|f| f.starts_with('#'))
                || (record.len() == 1 && record.get(0) == Some(""))
            {
                continue;
            }
            let line = record.position().map_or(0, |p| p.line());
            if !seen_header {
                seen_header = true;
                continue;
            }
            self.check_width(record.len(), line)?;
            for (k, &col) in wanted.iter().enumerate() {
                let token = record.get(col).unwrap_or_default();
                out.values[k].push(self.parse_value(token, col, line)?);
            }
            out.num_rows += 1;
        }
        Ok(())
    }

    fn read_whitespace_rows(&self, wanted: &[usize], out: &mut ColumnData) -> Result<()> {
        let body = self.text.lines().enumerate().skip(self.header_line as usize);
        for (i, raw) in body {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let line = i as u64 + 1;
            let fields: Vec<&str> = split_row(trimmed, Delimiter::Whitespace).collect();
            self.check_width(fields.len(), line)?;
            for (k, &col) in wanted.iter().enumerate() {
                out.values[k].push(self.parse_value(fields[col], col, line)?);
            }
            out.num_rows += 1;
        }
        Ok(())
    }

    fn check_width(&self, got: usize, line: u64) -> Result<()> {
        if got != self.header.len() {
            return Err(Error::CsvFormat {
                path: self.path.clone(),
                line,
                reason: format!("expected {} fields, found {}", self.header.len(), got),
            });
        }
        Ok(())
    }

    fn parse_value(&self, token: &str, col: usize, line: u64) -> Result<f64> {
        token.parse::<f64>().map_err(|_| Error::CsvParse {
            path: self.path.clone(),
            line,
            column: self.header[col].clone(),
            token: token.to_string(),
        })
    }
}

fn split_row(line: &str, delimiter: Delimiter) -> Box<dyn Iterator<Item = &str> + '_> {
    match delimiter {
        Delimiter::Comma => Box::new(line.split(',').map(str::trim)),
        Delimiter::Whitespace => Box::new(line.split_whitespace()),
    }
}
