use std::path::PathBuf;

/// Errors raised while reading, validating or writing tables.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// The file extension is not one of the supported table formats.
    #[error("unsupported table format: {} (expected .csv or .parquet)", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// One or more required columns are absent.
    #[error("missing columns {missing:?}; available: {available:?}")]
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// A column does not have as many rows as the rest of the table.
    #[error("column '{name}' has {got} rows, expected {expected}")]
    RaggedColumn {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
