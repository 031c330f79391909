use duckdb::arrow::array::{Array, Int64Array, StringArray};
use duckdb::arrow::datatypes::{DataType, Field, Schema};
use duckdb::arrow::record_batch::RecordBatch;
use std::sync::Arc;
use taxi_ingest::destination::memory::Operation;
use taxi_ingest::loader::NoProgress;
use taxi_ingest::{
    ChunkProgress, ChunkedLoader, DestinationError, IngestError, MemoryDestination,
    ProgressObserver, RecordTable, WriteMode,
};

// Trip-like table with an id column counting up from zero
fn trips(rows: i64) -> RecordTable {
    let schema = Arc::new(Schema::new(vec![
        Field::new("trip_id", DataType::Int64, false),
        Field::new("store_and_fwd_flag", DataType::Utf8, true),
    ]));
    let ids = Int64Array::from_iter_values(0..rows);
    let flags = StringArray::from_iter((0..rows).map(|i| (i % 3 != 0).then_some("N")));
    RecordTable::new(RecordBatch::try_new(schema, vec![Arc::new(ids), Arc::new(flags)]).unwrap())
}

fn zones(rows: i64) -> RecordTable {
    let schema = Arc::new(Schema::new(vec![Field::new("LocationID", DataType::Int64, false)]));
    let ids = Int64Array::from_iter_values(1..=rows);
    RecordTable::new(RecordBatch::try_new(schema, vec![Arc::new(ids)]).unwrap())
}

#[derive(Default)]
struct Recorder {
    started: Option<(usize, usize)>,
    chunks: Vec<ChunkProgress>,
    finished: bool,
}

impl ProgressObserver for Recorder {
    fn start(&mut self, total_chunks: usize, total_rows: usize) {
        self.started = Some((total_chunks, total_rows));
    }

    fn on_chunk(&mut self, progress: ChunkProgress) {
        self.chunks.push(progress);
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

fn append(table: &str, rows: usize) -> Operation {
    Operation::Append {
        table: table.to_string(),
        rows,
    }
}

fn replace(table: &str) -> Operation {
    Operation::Replace {
        table: table.to_string(),
    }
}

#[cfg(test)]
mod loader_tests {
    use super::*;

    #[test]
    fn test_250_rows_in_chunks_of_100() {
        let mut destination = MemoryDestination::new();
        let mut progress = Recorder::default();
        let loader = ChunkedLoader::new(100).unwrap();

        let rows = loader
            .load(&trips(250), "yellow_taxi_data", &mut destination, &mut progress)
            .unwrap();

        assert_eq!(rows, 250);
        assert_eq!(
            destination.operations(),
            &[
                replace("yellow_taxi_data"),
                append("yellow_taxi_data", 100),
                append("yellow_taxi_data", 100),
                append("yellow_taxi_data", 50),
            ]
        );
        assert_eq!(progress.started, Some((3, 250)));
        assert_eq!(
            progress.chunks,
            vec![
                ChunkProgress { index: 0, rows: 100, total_chunks: 3 },
                ChunkProgress { index: 1, rows: 100, total_chunks: 3 },
                ChunkProgress { index: 2, rows: 50, total_chunks: 3 },
            ]
        );
        assert!(progress.finished);
    }

    #[test]
    fn test_chunks_reconstruct_rows_in_order() {
        let mut destination = MemoryDestination::new();
        let loader = ChunkedLoader::new(7).unwrap();
        loader
            .load(&trips(50), "yellow_taxi_data", &mut destination, &mut NoProgress)
            .unwrap();

        let loaded: Vec<i64> = destination
            .batches("yellow_taxi_data")
            .unwrap()
            .iter()
            .flat_map(|batch| {
                let ids = batch
                    .column(0)
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .unwrap();
                ids.values().to_vec()
            })
            .collect();
        assert_eq!(loaded, (0..50).collect::<Vec<i64>>());
    }

    #[test]
    fn test_empty_table_only_creates_schema() {
        let mut destination = MemoryDestination::new();
        let mut progress = Recorder::default();
        let loader = ChunkedLoader::new(100).unwrap();

        let rows = loader
            .load(&trips(0), "yellow_taxi_data", &mut destination, &mut progress)
            .unwrap();

        assert_eq!(rows, 0);
        assert_eq!(destination.operations(), &[replace("yellow_taxi_data")]);
        assert_eq!(destination.row_count("yellow_taxi_data"), Some(0));
        assert_eq!(
            destination.column_names("yellow_taxi_data").unwrap(),
            vec!["trip_id", "store_and_fwd_flag"]
        );
        assert!(progress.chunks.is_empty());
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        assert!(matches!(
            ChunkedLoader::new(0),
            Err(IngestError::InvalidChunkSize)
        ));
    }

    #[test]
    fn test_repeated_append_duplicates_rows() {
        let mut destination = MemoryDestination::new();
        let table = trips(120);

        ChunkedLoader::new(50)
            .unwrap()
            .load(&table, "yellow_taxi_data", &mut destination, &mut NoProgress)
            .unwrap();
        ChunkedLoader::new(50)
            .unwrap()
            .with_mode(WriteMode::Append)
            .load(&table, "yellow_taxi_data", &mut destination, &mut NoProgress)
            .unwrap();

        assert_eq!(destination.row_count("yellow_taxi_data"), Some(240));
        let replaces = destination
            .operations()
            .iter()
            .filter(|op| matches!(op, Operation::Replace { .. }))
            .count();
        assert_eq!(replaces, 1);
    }

    #[test]
    fn test_reload_replaces_previous_contents() {
        let mut destination = MemoryDestination::new();
        let loader = ChunkedLoader::new(100).unwrap();

        loader
            .load(&trips(120), "yellow_taxi_data", &mut destination, &mut NoProgress)
            .unwrap();
        loader
            .load(&trips(120), "yellow_taxi_data", &mut destination, &mut NoProgress)
            .unwrap();

        assert_eq!(destination.row_count("yellow_taxi_data"), Some(120));
    }

    #[test]
    fn test_replace_adopts_new_column_set() {
        let mut destination = MemoryDestination::new();
        let loader = ChunkedLoader::new(10).unwrap();

        loader
            .load(&trips(25), "taxi_zone", &mut destination, &mut NoProgress)
            .unwrap();
        loader
            .load(&zones(5), "taxi_zone", &mut destination, &mut NoProgress)
            .unwrap();

        assert_eq!(
            destination.column_names("taxi_zone").unwrap(),
            vec!["LocationID"]
        );
        assert_eq!(destination.row_count("taxi_zone"), Some(5));
    }

    #[test]
    fn test_append_mode_requires_existing_table() {
        let mut destination = MemoryDestination::new();
        let loader = ChunkedLoader::new(10).unwrap().with_mode(WriteMode::Append);

        let result = loader.load(&zones(5), "taxi_zone", &mut destination, &mut NoProgress);

        match result {
            Err(IngestError::DestinationWrite { table, source }) => {
                assert_eq!(table, "taxi_zone");
                assert!(matches!(source, DestinationError::MissingTable(_)));
            }
            other => panic!("expected destination write error, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_append_keeps_earlier_chunks() {
        let mut destination = MemoryDestination::new().fail_on_append(2);
        let mut progress = Recorder::default();
        let loader = ChunkedLoader::new(100).unwrap();

        let result = loader.load(&trips(250), "yellow_taxi_data", &mut destination, &mut progress);

        match result {
            Err(IngestError::DestinationWrite { table, source }) => {
                assert_eq!(table, "yellow_taxi_data");
                assert!(matches!(source, DestinationError::Rejected(_)));
            }
            other => panic!("expected destination write error, got {:?}", other),
        }
        assert_eq!(destination.row_count("yellow_taxi_data"), Some(100));
        assert_eq!(progress.chunks.len(), 1);
        assert!(!progress.finished);
    }

    #[test]
    fn test_chunk_count_matches_ceiling() {
        for (rows, chunk_size, expected) in [(1, 1, 1), (99, 100, 1), (100, 100, 1), (101, 100, 2), (265, 53, 5)] {
            let mut destination = MemoryDestination::new();
            let mut progress = Recorder::default();
            ChunkedLoader::new(chunk_size)
                .unwrap()
                .load(&zones(rows), "taxi_zone", &mut destination, &mut progress)
                .unwrap();

            assert_eq!(progress.chunks.len(), expected);
            assert_eq!(destination.row_count("taxi_zone"), Some(rows as usize));
        }
    }
}
