pub mod duckdb_destination;
pub mod memory;

use duckdb::arrow::record_batch::RecordBatch;

use crate::error::DestinationError;

pub use duckdb_destination::DuckDbDestination;
pub use memory::MemoryDestination;

/// The two operations the chunked loader needs from a relational store.
/// We could add destinations for other databases here in the future.
pub trait Destination {
    /// Drop any table called `name` and recreate it with the columns of
    /// `empty_projection`. Prior contents are lost.
    fn replace_table(&mut self, name: &str, empty_projection: &RecordBatch)
        -> Result<(), DestinationError>;

    /// Insert `rows` into the existing table `name` without touching existing rows.
    fn append_rows(&mut self, name: &str, rows: &RecordBatch) -> Result<usize, DestinationError>;
}
