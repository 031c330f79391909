use log::info;

use crate::destination::Destination;
use crate::error::{IngestError, SourceError};
use crate::loader::{ChunkedLoader, ProgressObserver, WriteMode};
use crate::schema::ColumnSchema;
use crate::source::SourceReader;
use crate::table::RecordTable;

/// Read `location` fully and coerce it to `schema`.
pub fn read_source(location: &str, schema: &ColumnSchema) -> Result<RecordTable, IngestError> {
    let reader = SourceReader::new().map_err(|source: SourceError| IngestError::SourceRead {
        location: location.to_string(),
        source,
    })?;
    reader.read(location, schema)
}

/// Read `location`, coerce it to `schema` and load it into `target` in
/// chunks of `chunk_size` rows, replacing or appending to it per `mode`.
/// Returns the number of rows loaded.
///
/// Nothing is written to the destination unless reading and coercion
/// both succeed.
pub fn process_file<D, P>(
    location: &str,
    schema: &ColumnSchema,
    target: &str,
    chunk_size: usize,
    mode: WriteMode,
    destination: &mut D,
    progress: &mut P,
) -> Result<usize, IngestError>
where
    D: Destination + ?Sized,
    P: ProgressObserver + ?Sized,
{
    let loader = ChunkedLoader::new(chunk_size)?.with_mode(mode);

    info!("Loading data from: {}", location);
    let table = read_source(location, schema)?;
    info!("Total rows: {}", table.num_rows());
    info!("Columns: {:?}", table.column_names());

    let rows = loader.load(&table, target, destination, progress)?;
    info!("Successfully inserted {} rows into '{}' table", rows, target);
    Ok(rows)
}
