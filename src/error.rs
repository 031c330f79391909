use duckdb::arrow::datatypes::DataType;
use duckdb::arrow::error::ArrowError;
use std::io;
use thiserror::Error;
use zip::result::ZipError;

/// Errors surfaced by an ingest run. Every variant is terminal for the run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read source '{location}': {source}")]
    SourceRead {
        location: String,
        #[source]
        source: SourceError,
    },

    #[error("failed to coerce column types for '{location}': {source}")]
    TypeCoercion {
        location: String,
        #[source]
        source: duckdb::Error,
    },

    #[error("failed to write to destination table '{table}': {source}")]
    DestinationWrite {
        table: String,
        #[source]
        source: DestinationError,
    },

    #[error("chunk size must be a positive integer")]
    InvalidChunkSize,

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Reasons a source file could not be staged.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Zip(#[from] ZipError),

    #[error(transparent)]
    Database(#[from] duckdb::Error),

    #[error(transparent)]
    Arrow(#[from] ArrowError),

    #[error("unknown or unsupported file type")]
    UnknownFormat,

    #[error("no .csv, .csv.gz or .parquet member found in zip archive")]
    NoTabularMember,
}

/// Reasons a destination rejected a schema replace or an append.
#[derive(Debug, Error)]
pub enum DestinationError {
    #[error(transparent)]
    Database(#[from] duckdb::Error),

    #[error("column '{column}' has a type the destination cannot store: {data_type}")]
    UnsupportedType { column: String, data_type: DataType },

    #[error("table '{0}' does not exist")]
    MissingTable(String),

    #[error("row batch schema does not match table '{0}'")]
    SchemaMismatch(String),

    #[error("write rejected: {0}")]
    Rejected(String),
}
