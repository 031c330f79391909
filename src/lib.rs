//! Chunked loading of NYC taxi trip records and zone lookups into PostgreSQL.
//!
//! A source file (CSV, gzip CSV, Parquet, or a zip holding one of those) is
//! read fully through DuckDB, coerced to a static column schema, and written
//! to the destination by replacing the target table and appending fixed-size
//! chunks to it.

pub mod config;
pub mod destination;
pub mod error;
pub mod loader;
pub mod processor;
pub mod schema;
pub mod source;
pub mod table;

#[cfg(feature = "python")]
mod python;

pub use destination::{Destination, DuckDbDestination, MemoryDestination};
pub use error::{DestinationError, IngestError, SourceError};
pub use loader::{ChunkProgress, ChunkedLoader, ProgressObserver, WriteMode};
pub use processor::{process_file, read_source};
pub use schema::{
    ColumnSchema, SemanticType, SourceColumn, PASSTHROUGH_SCHEMA, TRIP_SCHEMA, ZONE_SCHEMA,
};
pub use table::RecordTable;
