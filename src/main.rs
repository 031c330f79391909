//! CLI for loading NYC taxi data into PostgreSQL.

use std::error::Error;
use std::io::IsTerminal;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use taxi_ingest::config::{
    clean_table_name, join_location, PostgresConfig, TripFile, DEFAULT_TRIP_PREFIX,
};
use taxi_ingest::loader::{BarProgress, NoProgress, ProgressObserver, TextProgress};
use taxi_ingest::{
    read_source, ChunkedLoader, ColumnSchema, Destination, DuckDbDestination, IngestError,
    MemoryDestination, WriteMode, TRIP_SCHEMA, ZONE_SCHEMA,
};

#[derive(Debug, Parser)]
#[command(name = "taxi-ingest", version, about = "Load taxi trip and zone data into PostgreSQL in chunks")]
struct Cli {
    #[command(flatten)]
    postgres: PostgresArgs,

    /// Load into an in-memory destination instead of PostgreSQL
    #[arg(long, global = true, default_value_t = false)]
    dry_run: bool,

    /// Append to the existing target table instead of replacing it
    #[arg(long, global = true, default_value_t = false)]
    append: bool,

    /// Disable per-chunk progress output
    #[arg(long, global = true, default_value_t = false)]
    no_progress: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn write_mode(&self) -> WriteMode {
        if self.append {
            WriteMode::Append
        } else {
            WriteMode::Replace
        }
    }
}

#[derive(Debug, Args)]
struct PostgresArgs {
    /// PostgreSQL user
    #[arg(long, global = true, env = "PG_USER", default_value = "root")]
    pg_user: String,

    /// PostgreSQL password
    #[arg(long, global = true, env = "PG_PASSWORD", default_value = "root", hide_env_values = true)]
    pg_pass: String,

    /// PostgreSQL host
    #[arg(long, global = true, env = "PG_HOST", default_value = "localhost")]
    pg_host: String,

    /// PostgreSQL port
    #[arg(long, global = true, env = "PG_PORT", default_value_t = 5432)]
    pg_port: u16,

    /// PostgreSQL database name
    #[arg(long, global = true, env = "PG_DB", default_value = "ny_taxi")]
    pg_db: String,

    /// Schema the target table lives in
    #[arg(long, global = true, env = "PG_SCHEMA", default_value = "public")]
    pg_schema: String,
}

impl From<PostgresArgs> for PostgresConfig {
    fn from(args: PostgresArgs) -> Self {
        Self {
            user: args.pg_user,
            password: args.pg_pass,
            host: args.pg_host,
            port: args.pg_port,
            database: args.pg_db,
            schema: args.pg_schema,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a monthly trip file, from a release URL or a local data directory
    Trips {
        #[arg(long)]
        year: u16,

        #[arg(long)]
        month: u8,

        /// Trip file color, e.g. yellow or green
        #[arg(long, default_value = "yellow")]
        color: String,

        /// Release URL prefix the file is downloaded from
        #[arg(long, default_value = DEFAULT_TRIP_PREFIX, conflicts_with = "data_dir")]
        prefix: String,

        /// Read the file from this directory instead of the release URL
        #[arg(long)]
        data_dir: Option<String>,

        #[arg(long, default_value = "yellow_taxi_data")]
        target_table: String,

        #[arg(long, default_value_t = 100_000)]
        chunk_size: usize,
    },

    /// Load the taxi zone lookup table
    Zones {
        /// Directory containing the CSV files
        #[arg(long, default_value = "data")]
        data_dir: String,

        #[arg(long, default_value = "taxi_zone_lookup.csv")]
        csv_file: String,

        #[arg(long, default_value = "taxi_zone")]
        target_table: String,

        #[arg(long, default_value_t = 53)]
        chunk_size: usize,
    },

    /// Load any CSV, gzip CSV, Parquet or zipped file
    Load {
        /// Local path or http(s)/s3 URL
        #[arg(long)]
        source: String,

        /// Column schema to coerce to: trips, zones or none
        #[arg(long, default_value = "none")]
        columns: String,

        /// Defaults to the source file name without extension
        #[arg(long)]
        target_table: Option<String>,

        #[arg(long, default_value_t = 100_000)]
        chunk_size: usize,
    },
}

// A resolved job: where to read, how to coerce, where to write
#[derive(Debug)]
struct Job {
    location: String,
    schema: ColumnSchema,
    target_table: String,
    chunk_size: usize,
    mode: WriteMode,
}

impl Command {
    fn into_job(self, mode: WriteMode) -> Result<Job, IngestError> {
        match self {
            Command::Trips {
                year,
                month,
                color,
                prefix,
                data_dir,
                target_table,
                chunk_size,
            } => {
                let trip_file = TripFile::new(&color, year, month)?;
                let location = match data_dir {
                    Some(dir) => trip_file.local_location(&dir),
                    None => trip_file.remote_location(&prefix),
                };
                Ok(Job {
                    location,
                    schema: TRIP_SCHEMA,
                    target_table,
                    chunk_size,
                    mode,
                })
            }
            Command::Zones {
                data_dir,
                csv_file,
                target_table,
                chunk_size,
            } => Ok(Job {
                location: join_location(&data_dir, &csv_file),
                schema: ZONE_SCHEMA,
                target_table,
                chunk_size,
                mode,
            }),
            Command::Load {
                source,
                columns,
                target_table,
                chunk_size,
            } => {
                let schema = ColumnSchema::by_name(&columns).ok_or_else(|| {
                    IngestError::Config(format!(
                        "unknown column schema '{}', expected trips, zones or none",
                        columns
                    ))
                })?;
                let target_table = target_table.unwrap_or_else(|| clean_table_name(&source));
                Ok(Job {
                    location: source,
                    schema,
                    target_table,
                    chunk_size,
                    mode,
                })
            }
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mode = cli.write_mode();
    let job = cli.command.into_job(mode)?;
    let config = PostgresConfig::from(cli.postgres);

    let mut progress: Box<dyn ProgressObserver> = if cli.no_progress {
        Box::new(NoProgress)
    } else if std::io::stdout().is_terminal() {
        Box::new(BarProgress::new())
    } else {
        Box::new(TextProgress::stdout())
    };

    if cli.dry_run {
        info!("Dry run: loading into memory, PostgreSQL is not contacted");
        let mut destination = MemoryDestination::new();
        load(&job, &mut destination, progress.as_mut())?;
        info!(
            "Dry run finished with {} destination operations",
            destination.operations().len()
        );
        return Ok(());
    }

    let mut destination = DuckDbDestination::postgres(&config.uri(), &config.schema).map_err(
        |source| IngestError::DestinationWrite {
            table: job.target_table.clone(),
            source,
        },
    )?;
    load(&job, &mut destination, progress.as_mut())?;
    report_stored_rows(&destination, &job.target_table);
    Ok(())
}

// Rows are committed by the time this runs, so a failed count is not an error
fn report_stored_rows(destination: &DuckDbDestination, table: &str) -> Option<usize> {
    match destination.row_count(table) {
        Ok(stored) => {
            info!("Table '{}' now holds {} rows", table, stored);
            Some(stored)
        }
        Err(e) => {
            warn!("Could not count rows in '{}': {}", table, e);
            None
        }
    }
}

fn load(
    job: &Job,
    destination: &mut dyn Destination,
    progress: &mut dyn ProgressObserver,
) -> Result<usize, IngestError> {
    let loader = ChunkedLoader::new(job.chunk_size)?.with_mode(job.mode);

    println!("Loading data from: {}", job.location);
    let table = read_source(&job.location, &job.schema)?;
    println!("Total rows: {}", table.num_rows());
    info!("Columns: {:?}", table.column_names());

    let rows = loader.load(&table, &job.target_table, destination, progress)?;
    println!(
        "\n Successfully inserted {} rows into '{}' table",
        rows, job.target_table
    );
    Ok(rows)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("An error occurred: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn job(args: &[&str]) -> Result<Job, IngestError> {
        let cli = Cli::try_parse_from(args).unwrap();
        let mode = cli.write_mode();
        cli.command.into_job(mode)
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_load_target_defaults_to_file_stem() {
        let job = job(&["taxi-ingest", "load", "--source", "data/taxi_zone_lookup.csv"]).unwrap();

        assert_eq!(job.location, "data/taxi_zone_lookup.csv");
        assert_eq!(job.target_table, "taxi_zone_lookup");
        assert_eq!(job.schema.name, "none");
        assert_eq!(job.chunk_size, 100_000);
        assert_eq!(job.mode, WriteMode::Replace);
    }

    #[test]
    fn test_unknown_column_schema_is_a_config_error() {
        let result = job(&["taxi-ingest", "load", "--source", "a.csv", "--columns", "buses"]);

        match result {
            Err(IngestError::Config(message)) => assert!(message.contains("buses")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_trips_from_data_dir_builds_local_path() {
        let job = job(&[
            "taxi-ingest",
            "trips",
            "--year",
            "2021",
            "--month",
            "1",
            "--data-dir",
            "data",
        ])
        .unwrap();

        assert_eq!(job.location, "data/yellow_tripdata_2021-01.csv.gz");
        assert_eq!(job.target_table, "yellow_taxi_data");
        assert_eq!(job.schema, TRIP_SCHEMA);
    }

    #[test]
    fn test_trips_default_to_release_url() {
        let job = job(&["taxi-ingest", "trips", "--year", "2021", "--month", "7"]).unwrap();

        assert!(job.location.starts_with(DEFAULT_TRIP_PREFIX));
        assert!(job.location.ends_with("yellow_tripdata_2021-07.csv.gz"));
    }

    #[test]
    fn test_trips_reject_month_out_of_range() {
        let result = job(&["taxi-ingest", "trips", "--year", "2021", "--month", "13"]);
        assert!(matches!(result, Err(IngestError::Config(_))));
    }

    #[test]
    fn test_failed_row_count_is_not_an_error() {
        let destination = DuckDbDestination::in_memory().unwrap();
        assert_eq!(report_stored_rows(&destination, "taxi_zone"), None);

        destination
            .conn()
            .execute_batch(
                "CREATE TABLE taxi_zone (id BIGINT);
                INSERT INTO taxi_zone VALUES (1), (2);",
            )
            .unwrap();
        assert_eq!(report_stored_rows(&destination, "taxi_zone"), Some(2));
    }

    #[test]
    fn test_append_flag_selects_append_mode() {
        let cli = Cli::try_parse_from(["taxi-ingest", "zones", "--append"]).unwrap();
        assert_eq!(cli.write_mode(), WriteMode::Append);

        let job = cli.command.into_job(WriteMode::Append).unwrap();
        assert_eq!(job.location, "data/taxi_zone_lookup.csv");
        assert_eq!(job.target_table, "taxi_zone");
        assert_eq!(job.chunk_size, 53);
        assert_eq!(job.mode, WriteMode::Append);
    }
}
