use duckdb::arrow::datatypes::{DataType, Schema, TimeUnit};
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::vtab::{arrow::ArrowVTab, arrow_recordbatch_to_query_params};
use duckdb::Connection;
use log::{debug, info};
use std::path::Path;

use crate::destination::Destination;
use crate::error::DestinationError;
use crate::schema::{quote_ident, quote_literal};

// Alias of the attached PostgreSQL database inside DuckDB
const POSTGRES_CATALOG: &str = "pg_target";

/// Writes through a DuckDB connection, either into an attached PostgreSQL
/// database or into a DuckDB database of its own.
pub struct DuckDbDestination {
    conn: Connection,
    catalog: Option<String>,
    schema_name: Option<String>,
}

impl DuckDbDestination {
    /// Attach the PostgreSQL database at `uri` and make sure `schema_name` exists.
    pub fn postgres(uri: &str, schema_name: &str) -> Result<Self, DestinationError> {
        let conn = Connection::open_in_memory()?;

        // Install and load required extensions
        conn.execute_batch("INSTALL postgres; LOAD postgres;")?;
        conn.execute_batch(&format!(
            "ATTACH {} AS {} (TYPE POSTGRES);",
            quote_literal(uri),
            POSTGRES_CATALOG
        ))?;
        info!("Attached PostgreSQL database as {}", POSTGRES_CATALOG);

        let destination = Self::with_connection(
            conn,
            Some(POSTGRES_CATALOG.to_string()),
            Some(schema_name.to_string()),
        )?;
        destination.create_schema()?;
        Ok(destination)
    }

    pub fn in_memory() -> Result<Self, DestinationError> {
        Self::with_connection(Connection::open_in_memory()?, None, None)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DestinationError> {
        Self::with_connection(Connection::open(path)?, None, None)
    }

    fn with_connection(
        conn: Connection,
        catalog: Option<String>,
        schema_name: Option<String>,
    ) -> Result<Self, DestinationError> {
        conn.register_table_function::<ArrowVTab>("arrow")?;
        Ok(Self {
            conn,
            catalog,
            schema_name,
        })
    }

    // Create the schema
    fn create_schema(&self) -> Result<(), DestinationError> {
        if let (Some(catalog), Some(schema_name)) = (&self.catalog, &self.schema_name) {
            self.conn.execute_batch(&format!(
                "CREATE SCHEMA IF NOT EXISTS {}.{};",
                quote_ident(catalog),
                quote_ident(schema_name)
            ))?;
        }
        Ok(())
    }

    // Get the fully qualified table
    pub fn qualified_table(&self, name: &str) -> String {
        [self.catalog.as_deref(), self.schema_name.as_deref(), Some(name)]
            .into_iter()
            .flatten()
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn row_count(&self, name: &str) -> Result<usize, DestinationError> {
        let query = format!("SELECT COUNT(*) FROM {}", self.qualified_table(name));
        let count: i64 = self.conn.query_row(&query, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn column_names(&self, name: &str) -> Result<Vec<String>, DestinationError> {
        let query = format!("SELECT * FROM {} LIMIT 0", self.qualified_table(name));
        let mut stmt = self.conn.prepare(&query)?;
        let schema = stmt.query_arrow([])?.get_schema();
        Ok(schema.fields().iter().map(|field| field.name().clone()).collect())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl Destination for DuckDbDestination {
    fn replace_table(
        &mut self,
        name: &str,
        empty_projection: &RecordBatch,
    ) -> Result<(), DestinationError> {
        let target = self.qualified_table(name);
        let columns = column_definitions(&empty_projection.schema())?;
        let query = format!(
            "DROP TABLE IF EXISTS {target};\nCREATE TABLE {target} ({columns});",
            target = target,
            columns = columns
        );
        debug!("Replacing table: {}", query);
        self.conn.execute_batch(&query)?;
        Ok(())
    }

    fn append_rows(&mut self, name: &str, rows: &RecordBatch) -> Result<usize, DestinationError> {
        if rows.num_rows() == 0 {
            return Ok(0);
        }
        let query = format!(
            "INSERT INTO {} SELECT * FROM arrow(?, ?)",
            self.qualified_table(name)
        );
        let params = arrow_recordbatch_to_query_params(rows.clone());
        let mut stmt = self.conn.prepare(&query)?;
        let inserted = stmt.execute(params)?;
        Ok(inserted)
    }
}

// Render `"col" TYPE, ...` for CREATE TABLE from an Arrow schema
pub fn column_definitions(schema: &Schema) -> Result<String, DestinationError> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            duckdb_column_type(field.data_type())
                .map(|sql_type| format!("{} {}", quote_ident(field.name()), sql_type))
                .ok_or_else(|| DestinationError::UnsupportedType {
                    column: field.name().clone(),
                    data_type: field.data_type().clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns.join(", "))
}

pub fn duckdb_column_type(data_type: &DataType) -> Option<String> {
    let sql_type = match data_type {
        DataType::Boolean => "BOOLEAN".to_string(),
        DataType::Int8 => "TINYINT".to_string(),
        DataType::Int16 => "SMALLINT".to_string(),
        DataType::Int32 => "INTEGER".to_string(),
        DataType::Int64 => "BIGINT".to_string(),
        DataType::UInt8 => "UTINYINT".to_string(),
        DataType::UInt16 => "USMALLINT".to_string(),
        DataType::UInt32 => "UINTEGER".to_string(),
        DataType::UInt64 => "UBIGINT".to_string(),
        DataType::Float32 => "REAL".to_string(),
        DataType::Float64 => "DOUBLE".to_string(),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => "VARCHAR".to_string(),
        DataType::Binary | DataType::LargeBinary => "BLOB".to_string(),
        DataType::Date32 | DataType::Date64 => "DATE".to_string(),
        DataType::Time32(_) | DataType::Time64(_) => "TIME".to_string(),
        DataType::Timestamp(_, Some(_)) => "TIMESTAMPTZ".to_string(),
        DataType::Timestamp(TimeUnit::Second, None) => "TIMESTAMP_S".to_string(),
        DataType::Timestamp(TimeUnit::Millisecond, None) => "TIMESTAMP_MS".to_string(),
        DataType::Timestamp(TimeUnit::Microsecond, None) => "TIMESTAMP".to_string(),
        DataType::Timestamp(TimeUnit::Nanosecond, None) => "TIMESTAMP_NS".to_string(),
        DataType::Interval(_) => "INTERVAL".to_string(),
        DataType::Decimal128(precision, scale) => format!("DECIMAL({}, {})", precision, scale),
        DataType::Dictionary(_, value) => return duckdb_column_type(value),
        _ => return None,
    };
    Some(sql_type)
}
