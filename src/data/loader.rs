//! Tabular data loading
//!
//! Reads delimited text through the polars CSV reader and spreadsheets
//! through calamine. Both paths produce a polars [`DataFrame`].

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{Result, TrainerError};

/// Declared format of a table source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// Delimited text with a header row
    Delimited { separator: u8 },
    /// Workbook; the first worksheet is read
    Spreadsheet,
}

impl DataFormat {
    pub fn csv() -> Self {
        DataFormat::Delimited { separator: b',' }
    }

    pub fn tsv() -> Self {
        DataFormat::Delimited { separator: b'\t' }
    }

    /// Resolve a format from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "txt" => Ok(Self::csv()),
            "tsv" | "tab" => Ok(Self::tsv()),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(DataFormat::Spreadsheet),
            other => Err(TrainerError::UnsupportedFormat(format!(
                "'{}' (expected csv, tsv, xlsx, xls or ods)",
                other
            ))),
        }
    }

    /// Resolve a format from a path's extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                TrainerError::UnsupportedFormat(format!("{} has no file extension", path.display()))
            })?;
        Self::from_extension(ext)
    }

    /// Canonical file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            DataFormat::Delimited { separator: b'\t' } => "tsv",
            DataFormat::Delimited { .. } => "csv",
            DataFormat::Spreadsheet => "xlsx",
        }
    }
}

impl FromStr for DataFormat {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "delimited" => Ok(Self::csv()),
            "spreadsheet" | "excel" => Ok(DataFormat::Spreadsheet),
            other => Self::from_extension(other.trim_start_matches('.')),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Where a table comes from
#[derive(Debug, Clone)]
pub enum DataSource {
    /// File on disk
    Path(PathBuf),
    /// In-memory upload
    Upload { file_name: String, bytes: Vec<u8> },
}

impl DataSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        DataSource::Path(path.into())
    }

    pub fn upload(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        DataSource::Upload {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Human-readable name used in logs and reports
    pub fn describe(&self) -> String {
        match self {
            DataSource::Path(path) => path.display().to_string(),
            DataSource::Upload { file_name, .. } => file_name.clone(),
        }
    }

    /// Format implied by the file name's extension
    pub fn infer_format(&self) -> Result<DataFormat> {
        match self {
            DataSource::Path(path) => DataFormat::from_path(path),
            DataSource::Upload { file_name, .. } => DataFormat::from_path(Path::new(file_name)),
        }
    }

    fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            DataSource::Path(path) => Ok(std::fs::read(&path)?),
            DataSource::Upload { bytes, .. } => Ok(bytes),
        }
    }
}

/// Loader for delimited and spreadsheet tables
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used for schema inference of delimited text
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(1000),
        }
    }

    /// Set the number of rows used for schema inference (`None` scans all rows)
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a table from `source` using the declared `format`.
    pub fn load(&self, source: DataSource, format: DataFormat) -> Result<DataFrame> {
        let start = Instant::now();
        let name = source.describe();
        let bytes = source.into_bytes()?;

        let df = match format {
            DataFormat::Delimited { separator } => self.parse_delimited(bytes, separator)?,
            DataFormat::Spreadsheet => self.parse_spreadsheet(bytes)?,
        };
        ensure_non_empty(&df)?;

        info!(
            source = %name,
            format = %format,
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded table"
        );
        Ok(df)
    }

    /// Load a file, inferring the format from its extension
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let format = DataFormat::from_path(path)?;
        self.load(DataSource::path(path), format)
    }

    /// Parse delimited text with a header row.
    ///
    /// Every record must have as many fields as the header; a ragged row is a
    /// `Parse` error rather than a row padded with nulls.
    pub fn parse_delimited(&self, bytes: Vec<u8>, separator: u8) -> Result<DataFrame> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(TrainerError::Parse("delimited input is empty".to_string()));
        }
        check_field_counts(&bytes, separator)?;

        let parse_opts = CsvParseOptions::default().with_separator(separator);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|e| TrainerError::Parse(e.to_string()))
    }

    /// Parse the first worksheet of a workbook.
    ///
    /// The first row holds column names. A column whose non-empty cells are
    /// all numeric becomes `Float64`; any other column becomes `String`.
    pub fn parse_spreadsheet(&self, bytes: Vec<u8>) -> Result<DataFrame> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| TrainerError::Parse(format!("unreadable workbook: {}", e)))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| TrainerError::Parse("workbook has no worksheets".to_string()))?
            .map_err(|e| TrainerError::Parse(e.to_string()))?;

        let mut rows = range.rows();
        let header = rows
            .next()
            .ok_or_else(|| TrainerError::Parse("worksheet is empty".to_string()))?;

        let names: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell {
                Data::Empty => format!("column_{}", i),
                other => other.to_string(),
            })
            .collect();

        let body: Vec<&[Data]> = rows.collect();
        debug!(columns = names.len(), rows = body.len(), "Parsed worksheet");

        let columns = names
            .iter()
            .enumerate()
            .map(|(idx, name)| sheet_column(name, idx, &body))
            .collect::<Vec<Column>>();

        DataFrame::new(columns).map_err(|e| TrainerError::Parse(e.to_string()))
    }
}

fn check_field_counts(bytes: &[u8], separator: u8) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let mut record = csv::ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) => return Err(TrainerError::Parse(format!("malformed delimited input: {}", e))),
        }
    }
}

fn sheet_column(name: &str, idx: usize, body: &[&[Data]]) -> Column {
    // Short rows read as empty cells.
    let cells: Vec<Option<&Data>> = body
        .iter()
        .map(|row| row.get(idx).filter(|c| !matches!(c, Data::Empty | Data::Error(_))))
        .collect();

    let numeric = cells
        .iter()
        .flatten()
        .all(|c| matches!(c, Data::Int(_) | Data::Float(_)));

    if numeric {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| match c {
                Some(Data::Int(v)) => Some(*v as f64),
                Some(Data::Float(v)) => Some(*v),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values).into()
    } else {
        let values: Vec<Option<String>> = cells
            .iter()
            .map(|c| c.map(|cell| cell.to_string()))
            .collect();
        Series::new(name.into(), values).into()
    }
}

fn ensure_non_empty(df: &DataFrame) -> Result<()> {
    if df.width() == 0 {
        return Err(TrainerError::Parse("table has no columns".to_string()));
    }
    if df.height() == 0 {
        return Err(TrainerError::Parse("table has no rows".to_string()));
    }
    Ok(())
}
