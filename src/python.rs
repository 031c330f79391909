use pyo3::prelude::*;

use crate::destination::DuckDbDestination;
use crate::loader::{LogProgress, WriteMode};
use crate::schema::ColumnSchema;

#[pyfunction]
#[pyo3(signature = (file_path, table_name, postgres_uri, schema_name, column_schema = "none", chunk_size = 100_000, append = false))]
fn process_file(
    file_path: &str,
    table_name: &str,
    postgres_uri: &str,
    schema_name: &str,
    column_schema: &str,
    chunk_size: usize,
    append: bool,
) -> PyResult<usize> {
    let schema = ColumnSchema::by_name(column_schema).ok_or_else(|| {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
            "unknown column schema '{}', expected trips, zones or none",
            column_schema
        ))
    })?;
    let mut destination = DuckDbDestination::postgres(postgres_uri, schema_name)
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string()))?;
    crate::processor::process_file(
        file_path,
        &schema,
        table_name,
        chunk_size,
        if append { WriteMode::Append } else { WriteMode::Replace },
        &mut destination,
        &mut LogProgress,
    )
    .map_err(|e| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string()))
}

#[pymodule]
#[pyo3(name = "taxi_ingest")]
fn taxi_ingest(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(process_file, m)?)?;
    Ok(())
}
