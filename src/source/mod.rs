pub mod file_type;

use duckdb::arrow::record_batch::RecordBatch;
use duckdb::Connection;
use log::{debug, info, warn};
use std::fs::File;
use std::io;
use tempfile::{Builder, NamedTempFile};
use zip::ZipArchive;

use crate::error::{IngestError, SourceError};
use crate::schema::{quote_literal, ColumnSchema, SourceColumn};
use crate::table::RecordTable;

pub use file_type::{determine_file_type, is_remote, FileType};

const RAW_TABLE: &str = "raw_data";
const COERCED_TABLE: &str = "data";

/// Reads a source file into memory through a private DuckDB connection and
/// coerces it to a column schema.
pub struct SourceReader {
    conn: Connection,
}

// A resolved, directly readable file. Holds the extracted temp file alive
// while DuckDB reads it.
struct ResolvedSource {
    path: String,
    file_type: FileType,
    _extracted: Option<NamedTempFile>,
}

impl SourceReader {
    pub fn new() -> Result<Self, SourceError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Read `location` fully and coerce it to `schema`.
    ///
    /// Staging failures are [`IngestError::SourceRead`]; a value that does not
    /// cast to its declared type is [`IngestError::TypeCoercion`].
    pub fn read(&self, location: &str, schema: &ColumnSchema) -> Result<RecordTable, IngestError> {
        let source_err = |source: SourceError| IngestError::SourceRead {
            location: location.to_string(),
            source,
        };

        let resolved = self.resolve(location).map_err(source_err)?;
        info!("Detected file type: {} for source: '{}'", resolved.file_type, location);

        self.stage_raw(&resolved, schema).map_err(source_err)?;
        let columns = self.raw_columns().map_err(source_err)?;

        let names: Vec<String> = columns.iter().map(|column| column.name.clone()).collect();
        let missing = schema.missing_columns(&names);
        if !missing.is_empty() {
            warn!(
                "Columns declared by the '{}' schema are not in the source and will be skipped: {:?}",
                schema.name, missing
            );
        }

        self.coerce(schema, &columns)
            .map_err(|source| IngestError::TypeCoercion {
                location: location.to_string(),
                source,
            })?;

        self.fetch_table().map_err(source_err)
    }

    fn resolve(&self, location: &str) -> Result<ResolvedSource, SourceError> {
        if is_remote(location) {
            let file_type =
                file_type::file_type_from_extension(location).ok_or(SourceError::UnknownFormat)?;
            if file_type == FileType::Zip {
                return Err(SourceError::UnknownFormat);
            }
            // httpfs covers http(s) and s3
            self.conn.execute_batch("INSTALL httpfs; LOAD httpfs;")?;
            return Ok(ResolvedSource {
                path: location.to_string(),
                file_type,
                _extracted: None,
            });
        }

        match determine_file_type(location)? {
            FileType::Zip => {
                let extracted = extract_tabular_member(location)?;
                let path = extracted.path().to_string_lossy().into_owned();
                let file_type = determine_file_type(&path)?;
                if file_type == FileType::Zip {
                    return Err(SourceError::NoTabularMember);
                }
                Ok(ResolvedSource {
                    path,
                    file_type,
                    _extracted: Some(extracted),
                })
            }
            file_type => Ok(ResolvedSource {
                path: location.to_string(),
                file_type,
                _extracted: None,
            }),
        }
    }

    // Create the raw staging table in duckdb. Declared CSV columns are read
    // as text so coercion sees the values exactly as written.
    fn stage_raw(
        &self,
        source: &ResolvedSource,
        schema: &ColumnSchema,
    ) -> Result<(), SourceError> {
        let path = quote_literal(&source.path);
        let reader = match source.file_type {
            FileType::Csv => format!("read_csv({}, header = true", path),
            FileType::GzipCsv => {
                format!("read_csv({}, header = true, compression = 'gzip'", path)
            }
            FileType::Parquet => format!("read_parquet({})", path),
            FileType::Zip => return Err(SourceError::NoTabularMember),
        };
        let reader = match source.file_type {
            FileType::Parquet => reader,
            _ => {
                let declared: Vec<String> = self
                    .describe(&format!("{})", reader))?
                    .into_iter()
                    .filter(|column| schema.lookup(&column.name).is_some())
                    .map(|column| format!("{}: 'VARCHAR'", quote_literal(&column.name)))
                    .collect();
                if declared.is_empty() {
                    format!("{})", reader)
                } else {
                    format!("{}, types = {{{}}})", reader, declared.join(", "))
                }
            }
        };
        let query = format!(
            "CREATE OR REPLACE TABLE {} AS SELECT * FROM {};",
            RAW_TABLE, reader
        );
        debug!("Staging source: {}", query);
        self.conn.execute_batch(&query)?;
        Ok(())
    }

    // Sniffed column names and types of a table function
    fn describe(&self, reader: &str) -> Result<Vec<SourceColumn>, SourceError> {
        let mut stmt = self
            .conn
            .prepare(&format!("DESCRIBE SELECT * FROM {}", reader))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(SourceColumn::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn raw_columns(&self) -> Result<Vec<SourceColumn>, SourceError> {
        let mut stmt = self.conn.prepare(
            "SELECT column_name, data_type
            FROM information_schema.columns
            WHERE table_name = ?
            ORDER BY ordinal_position",
        )?;
        let columns = stmt
            .query_map([RAW_TABLE], |row| {
                Ok(SourceColumn::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    // Cast declared columns into the coerced table and drop the staging copy
    fn coerce(&self, schema: &ColumnSchema, columns: &[SourceColumn]) -> Result<(), duckdb::Error> {
        let query = format!(
            "CREATE OR REPLACE TABLE {} AS SELECT {} FROM {};",
            COERCED_TABLE,
            schema.projection(columns),
            RAW_TABLE
        );
        debug!("Coercing source: {}", query);
        self.conn.execute_batch(&query)?;
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {};", RAW_TABLE))?;
        Ok(())
    }

    fn fetch_table(&self) -> Result<RecordTable, SourceError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {}", COERCED_TABLE))?;
        let arrow_result = stmt.query_arrow([])?;
        let schema = arrow_result.get_schema();
        let batches: Vec<RecordBatch> = arrow_result.collect();
        let table = RecordTable::from_batches(schema, &batches)?;
        debug!("The data schema is: {:?}", table.schema());
        Ok(table)
    }
}

// Find the first tabular member in a zip archive
pub fn find_tabular_member(zip_path: &str) -> Result<String, SourceError> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        let name = file.name().to_ascii_lowercase();
        if !file.is_dir()
            && (name.ends_with(".csv") || name.ends_with(".csv.gz") || name.ends_with(".parquet"))
        {
            return Ok(file.name().to_string());
        }
    }

    Err(SourceError::NoTabularMember)
}

// Extract the tabular member into a temp file that keeps its extension
fn extract_tabular_member(zip_path: &str) -> Result<NamedTempFile, SourceError> {
    let member = find_tabular_member(zip_path)?;
    info!("Tabular member found in archive: {}", member);

    let lower = member.to_ascii_lowercase();
    let suffix = if lower.ends_with(".csv.gz") {
        ".csv.gz"
    } else if lower.ends_with(".parquet") {
        ".parquet"
    } else {
        ".csv"
    };

    let mut archive = ZipArchive::new(File::open(zip_path)?)?;
    let mut entry = archive.by_name(&member)?;
    let mut extracted = Builder::new().suffix(suffix).tempfile()?;
    io::copy(&mut entry, extracted.as_file_mut())?;
    Ok(extracted)
}
