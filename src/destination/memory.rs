use duckdb::arrow::datatypes::SchemaRef;
use duckdb::arrow::record_batch::RecordBatch;
use std::collections::BTreeMap;

use crate::destination::Destination;
use crate::error::DestinationError;

/// A destination call, recorded in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Replace { table: String },
    Append { table: String, rows: usize },
}

#[derive(Debug, Clone)]
struct MemoryTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

/// Keeps destination tables in memory. Used for dry runs, and can reject a
/// chosen append to simulate a failing store.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    tables: BTreeMap<String, MemoryTable>,
    operations: Vec<Operation>,
    fail_on_append: Option<usize>,
    appends_attempted: usize,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the `n`-th append (1-based) counted over the destination's lifetime.
    pub fn fail_on_append(mut self, n: usize) -> Self {
        self.fail_on_append = Some(n);
        self
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn row_count(&self, name: &str) -> Option<usize> {
        self.tables
            .get(name)
            .map(|table| table.batches.iter().map(RecordBatch::num_rows).sum())
    }

    pub fn column_names(&self, name: &str) -> Option<Vec<String>> {
        self.tables.get(name).map(|table| {
            table
                .schema
                .fields()
                .iter()
                .map(|field| field.name().clone())
                .collect()
        })
    }

    pub fn batches(&self, name: &str) -> Option<&[RecordBatch]> {
        self.tables.get(name).map(|table| table.batches.as_slice())
    }
}

impl Destination for MemoryDestination {
    fn replace_table(
        &mut self,
        name: &str,
        empty_projection: &RecordBatch,
    ) -> Result<(), DestinationError> {
        self.tables.insert(
            name.to_string(),
            MemoryTable {
                schema: empty_projection.schema(),
                batches: Vec::new(),
            },
        );
        self.operations.push(Operation::Replace {
            table: name.to_string(),
        });
        Ok(())
    }

    fn append_rows(&mut self, name: &str, rows: &RecordBatch) -> Result<usize, DestinationError> {
        self.appends_attempted += 1;
        if self.fail_on_append == Some(self.appends_attempted) {
            return Err(DestinationError::Rejected(format!(
                "simulated failure on append {}",
                self.appends_attempted
            )));
        }

        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| DestinationError::MissingTable(name.to_string()))?;
        if table.schema.fields() != rows.schema().fields() {
            return Err(DestinationError::SchemaMismatch(name.to_string()));
        }

        table.batches.push(rows.clone());
        self.operations.push(Operation::Append {
            table: name.to_string(),
            rows: rows.num_rows(),
        });
        Ok(rows.num_rows())
    }
}
