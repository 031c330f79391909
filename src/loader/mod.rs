pub mod progress;

use log::info;
use std::num::NonZeroUsize;

use crate::destination::Destination;
use crate::error::{DestinationError, IngestError};
use crate::table::{chunk_count, chunk_ranges, RecordTable};

pub use progress::{
    BarProgress, ChunkProgress, LogProgress, NoProgress, ProgressObserver, TextProgress,
};

/// How the destination table is prepared before chunks are appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Drop and recreate the table from the source columns
    #[default]
    Replace,
    /// Append to the existing table as is
    Append,
}

/// Loads a materialised table into a destination in fixed-size row chunks.
///
/// The destination table is replaced first (unless the loader runs in
/// [`WriteMode::Append`]), then every chunk is appended in order. A failed
/// append aborts the run; chunks appended before it stay in the destination,
/// and nothing deduplicates repeated loads.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedLoader {
    chunk_size: NonZeroUsize,
    mode: WriteMode,
}

impl ChunkedLoader {
    pub fn new(chunk_size: usize) -> Result<Self, IngestError> {
        NonZeroUsize::new(chunk_size)
            .map(|chunk_size| Self {
                chunk_size,
                mode: WriteMode::Replace,
            })
            .ok_or(IngestError::InvalidChunkSize)
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.get()
    }

    pub fn load<D, P>(
        &self,
        table: &RecordTable,
        target: &str,
        destination: &mut D,
        progress: &mut P,
    ) -> Result<usize, IngestError>
    where
        D: Destination + ?Sized,
        P: ProgressObserver + ?Sized,
    {
        let destination_err = |source: DestinationError| IngestError::DestinationWrite {
            table: target.to_string(),
            source,
        };

        let row_count = table.num_rows();

        // Create table schema (no data)
        if self.mode == WriteMode::Replace {
            destination
                .replace_table(target, &table.empty_projection())
                .map_err(destination_err)?;
        }

        let total_chunks = chunk_count(row_count, self.chunk_size);
        info!(
            "Loading {} rows into '{}' in {} chunks of up to {} rows",
            row_count,
            target,
            total_chunks,
            self.chunk_size
        );
        progress.start(total_chunks, row_count);

        for (index, range) in chunk_ranges(row_count, self.chunk_size).enumerate() {
            let chunk = table.chunk(range);
            destination
                .append_rows(target, &chunk)
                .map_err(destination_err)?;
            progress.on_chunk(ChunkProgress {
                index,
                rows: chunk.num_rows(),
                total_chunks,
            });
        }

        progress.finish();
        Ok(row_count)
    }
}
