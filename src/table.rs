use duckdb::arrow::compute::concat_batches;
use duckdb::arrow::datatypes::SchemaRef;
use duckdb::arrow::error::ArrowError;
use duckdb::arrow::record_batch::RecordBatch;
use std::num::NonZeroUsize;
use std::ops::Range;

/// Fully materialised, type-coerced rows held as a single Arrow batch.
#[derive(Debug, Clone)]
pub struct RecordTable {
    batch: RecordBatch,
}

impl RecordTable {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Concatenate the batches a query produced. An empty slice gives a
    /// zero-row table that still carries `schema`.
    pub fn from_batches(schema: SchemaRef, batches: &[RecordBatch]) -> Result<Self, ArrowError> {
        let batch = concat_batches(&schema, batches)?;
        Ok(Self { batch })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect()
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Zero-row view with the full column set, used to create the destination table.
    pub fn empty_projection(&self) -> RecordBatch {
        self.batch.slice(0, 0)
    }

    /// Zero-copy view over `range`.
    pub fn chunk(&self, range: Range<usize>) -> RecordBatch {
        self.batch.slice(range.start, range.end - range.start)
    }
}

pub fn chunk_count(row_count: usize, chunk_size: NonZeroUsize) -> usize {
    row_count.div_ceil(chunk_size.get())
}

/// Row ranges `[i*size, min((i+1)*size, rows))` in increasing order.
pub fn chunk_ranges(
    row_count: usize,
    chunk_size: NonZeroUsize,
) -> impl Iterator<Item = Range<usize>> {
    let size = chunk_size.get();
    (0..chunk_count(row_count, chunk_size)).map(move |i| {
        let start = i * size;
        start..row_count.min(start + size)
    })
}
