//! In-memory tables, read from and written to CSV or Parquet by file extension.
//!
//! A [`Frame`] is an ordered set of named, nullable columns. Stages pull typed
//! vectors out of a frame by column name and build a new frame for their output.

mod csv_file;
mod error;
mod parquet_file;

use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

pub use csv_file::{read_csv_from, write_csv};
pub use error::TableError;

/// Supported on-disk table formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_string_lossy().to_lowercase();
        match extension.as_str() {
            "csv" => Some(TableFormat::Csv),
            "parquet" => Some(TableFormat::Parquet),
            _ => None,
        }
    }
}

/// A single nullable column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Vec<Option<String>>),
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    Bool(Vec<Option<bool>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Text(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a float column where NaN becomes null.
    pub fn floats(values: impl IntoIterator<Item = f64>) -> Self {
        Column::Float(
            values
                .into_iter()
                .map(|v| if v.is_nan() { None } else { Some(v) })
                .collect(),
        )
    }

    pub fn ints(values: impl IntoIterator<Item = i64>) -> Self {
        Column::Int(values.into_iter().map(Some).collect())
    }

    pub fn bools(values: impl IntoIterator<Item = bool>) -> Self {
        Column::Bool(values.into_iter().map(Some).collect())
    }

    pub fn text<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Column::Text(values.into_iter().map(|v| Some(v.into())).collect())
    }

    /// Renders one cell for delimited output; nulls become empty fields.
    fn cell(&self, row: usize) -> String {
        match self {
            Column::Text(v) => v[row].clone().unwrap_or_default(),
            Column::Float(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
            Column::Int(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
            Column::Bool(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.push_column(name, column);
        self
    }

    pub fn push_column(&mut self, name: impl Into<String>, column: Column) {
        self.names.push(name.into());
        self.columns.push(column);
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column, TableError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| TableError::MissingColumns {
                missing: vec![name.to_string()],
                available: self.names.clone(),
            })
    }

    /// Fails with every missing name at once, in the order requested.
    pub fn require(&self, required: &[&str]) -> Result<(), TableError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !self.has_column(name))
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(TableError::MissingColumns {
                missing,
                available: self.names.clone(),
            })
        }
    }

    pub fn text(&self, name: &str) -> Result<Vec<Option<String>>, TableError> {
        Ok(match self.column(name)? {
            Column::Text(v) => v.clone(),
            Column::Float(v) => v.iter().map(|x| x.map(|x| x.to_string())).collect(),
            Column::Int(v) => v.iter().map(|x| x.map(|x| x.to_string())).collect(),
            Column::Bool(v) => v.iter().map(|x| x.map(|x| x.to_string())).collect(),
        })
    }

    /// Float view of a column. Unparseable text and NaN are null.
    pub fn floats(&self, name: &str) -> Result<Vec<Option<f64>>, TableError> {
        Ok(match self.column(name)? {
            Column::Text(v) => v.iter().map(|s| s.as_deref().and_then(parse_float)).collect(),
            Column::Float(v) => v.iter().map(|x| x.filter(|x| !x.is_nan())).collect(),
            Column::Int(v) => v.iter().map(|x| x.map(|x| x as f64)).collect(),
            Column::Bool(v) => v.iter().map(|x| x.map(|b| if b { 1.0 } else { 0.0 })).collect(),
        })
    }

    /// Integer view of a column. Only integral floats convert.
    pub fn ints(&self, name: &str) -> Result<Vec<Option<i64>>, TableError> {
        Ok(match self.column(name)? {
            Column::Text(v) => v.iter().map(|s| s.as_deref().and_then(parse_int)).collect(),
            Column::Float(v) => v.iter().map(|x| x.and_then(integral)).collect(),
            Column::Int(v) => v.clone(),
            Column::Bool(v) => v.iter().map(|x| x.map(i64::from)).collect(),
        })
    }

    fn check_lengths(&self) -> Result<(), TableError> {
        let expected = self.num_rows();
        for (name, column) in self.names.iter().zip(&self.columns) {
            if column.len() != expected {
                return Err(TableError::RaggedColumn {
                    name: name.clone(),
                    expected,
                    got: column.len(),
                });
            }
        }
        Ok(())
    }
}

fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(integral))
}

fn integral(v: f64) -> Option<i64> {
    (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
}

/// Reads a `.csv` or `.parquet` file.
pub fn read_table(path: &Path) -> Result<Frame, TableError> {
    match TableFormat::from_path(path) {
        Some(TableFormat::Csv) => {
            let file = open(path)?;
            read_csv_from(file, b',')
        }
        Some(TableFormat::Parquet) => parquet_file::read_parquet(open(path)?),
        None => Err(TableError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Writes a frame as `.csv` or `.parquet`, creating parent directories.
pub fn write_table(frame: &Frame, path: &Path) -> Result<(), TableError> {
    let format = TableFormat::from_path(path).ok_or_else(|| TableError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    frame.check_lengths()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;

    match format {
        TableFormat::Csv => write_csv(frame, BufWriter::new(file)),
        TableFormat::Parquet => parquet_file::write_parquet(frame, file),
    }
}

fn open(path: &Path) -> Result<File, TableError> {
    File::open(path).map_err(|source| TableError::Open {
        path: path.to_path_buf(),
        source,
    })
}

// -- Tests -------------------------------------------------------------------
