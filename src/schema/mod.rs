use std::fmt;

/// Target type a declared column is coerced to before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    /// Nullable 64-bit integer
    Integer,
    Float,
    /// Nullable text
    String,
    Timestamp,
}

impl SemanticType {
    pub fn duckdb_type(self) -> &'static str {
        match self {
            SemanticType::Integer => "BIGINT",
            SemanticType::Float => "DOUBLE",
            SemanticType::String => "VARCHAR",
            SemanticType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticType::Integer => "integer",
            SemanticType::Float => "float",
            SemanticType::String => "string",
            SemanticType::Timestamp => "timestamp",
        };
        write!(f, "{}", name)
    }
}

/// A staged source column and the DuckDB type it was read as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumn {
    pub name: String,
    pub data_type: String,
}

impl SourceColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    fn is_text(&self) -> bool {
        self.data_type.eq_ignore_ascii_case("VARCHAR")
    }

    fn is_fractional(&self) -> bool {
        let data_type = self.data_type.to_ascii_uppercase();
        ["DOUBLE", "FLOAT", "REAL", "DECIMAL"]
            .iter()
            .any(|prefix| data_type.starts_with(prefix))
    }
}

/// Declarative column name to type table.
///
/// Declared columns missing from a source are skipped and undeclared source
/// columns keep whatever type the reader detected, so one schema serves every
/// published version of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: &'static str,
    pub columns: &'static [(&'static str, SemanticType)],
}

pub const TRIP_SCHEMA: ColumnSchema = ColumnSchema {
    name: "trips",
    columns: &[
        ("VendorID", SemanticType::Integer),
        ("tpep_pickup_datetime", SemanticType::Timestamp),
        ("tpep_dropoff_datetime", SemanticType::Timestamp),
        ("passenger_count", SemanticType::Integer),
        ("trip_distance", SemanticType::Float),
        ("RatecodeID", SemanticType::Integer),
        ("store_and_fwd_flag", SemanticType::String),
        ("PULocationID", SemanticType::Integer),
        ("DOLocationID", SemanticType::Integer),
        ("payment_type", SemanticType::Integer),
        ("fare_amount", SemanticType::Float),
        ("extra", SemanticType::Float),
        ("mta_tax", SemanticType::Float),
        ("tip_amount", SemanticType::Float),
        ("tolls_amount", SemanticType::Float),
        ("improvement_surcharge", SemanticType::Float),
        ("total_amount", SemanticType::Float),
        ("congestion_surcharge", SemanticType::Float),
    ],
};

// Borough/zone names are low-cardinality but land as plain text in the store
pub const ZONE_SCHEMA: ColumnSchema = ColumnSchema {
    name: "zones",
    columns: &[
        ("LocationID", SemanticType::Integer),
        ("Borough", SemanticType::String),
        ("Zone", SemanticType::String),
        ("service_zone", SemanticType::String),
    ],
};

pub const PASSTHROUGH_SCHEMA: ColumnSchema = ColumnSchema {
    name: "none",
    columns: &[],
};

pub const SCHEMAS: [ColumnSchema; 3] = [TRIP_SCHEMA, ZONE_SCHEMA, PASSTHROUGH_SCHEMA];

impl ColumnSchema {
    pub fn by_name(name: &str) -> Option<ColumnSchema> {
        SCHEMAS
            .iter()
            .find(|schema| schema.name.eq_ignore_ascii_case(name))
            .copied()
    }

    pub fn lookup(&self, column: &str) -> Option<SemanticType> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, semantic)| *semantic)
    }

    /// Build the SELECT list that coerces the staged `columns` to this schema.
    /// Column order follows the source.
    pub fn projection(&self, columns: &[SourceColumn]) -> String {
        columns
            .iter()
            .map(|column| match self.lookup(&column.name) {
                Some(semantic) => coerce_expr(column, semantic),
                None => quote_ident(&column.name),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Declared columns that the source does not carry.
    pub fn missing_columns(&self, present_columns: &[String]) -> Vec<&'static str> {
        self.columns
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| !present_columns.iter().any(|column| column == name))
            .collect()
    }
}

// Integer targets only accept integral values; anything else raises instead
// of being rounded by the cast
fn coerce_expr(column: &SourceColumn, semantic: SemanticType) -> String {
    let ident = quote_ident(&column.name);
    let cast = format!("CAST({} AS {})", ident, semantic.duckdb_type());

    let guard = match semantic {
        SemanticType::Integer if column.is_text() => Some(format!(
            "regexp_full_match(trim({}), '[+-]?[0-9]+(\\.0*)?')",
            ident
        )),
        SemanticType::Integer if column.is_fractional() => {
            Some(format!("{} = trunc({})", ident, ident))
        }
        _ => None,
    };

    match guard {
        Some(guard) => format!(
            "CASE WHEN {ident} IS NULL OR {guard} THEN {cast} \
             ELSE error(concat({prefix}, CAST({ident} AS VARCHAR), {suffix})) END AS {ident}",
            ident = ident,
            guard = guard,
            cast = cast,
            prefix = quote_literal(&format!("column {}: could not convert '", column.name)),
            suffix = quote_literal(&format!("' to {}", semantic)),
        ),
        None => format!("{} AS {}", cast, ident),
    }
}

// Quote an identifier for DuckDB/Postgres
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// Quote a string literal for DuckDB
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn text(names: &[&str]) -> Vec<SourceColumn> {
        names
            .iter()
            .map(|name| SourceColumn::new(*name, "VARCHAR"))
            .collect()
    }

    #[test]
    fn test_projection_casts_declared_columns() {
        let projection = ZONE_SCHEMA.projection(&text(&["Borough"]));
        assert_eq!(projection, "CAST(\"Borough\" AS VARCHAR) AS \"Borough\"");
    }

    #[test]
    fn test_projection_guards_integer_casts() {
        let projection = ZONE_SCHEMA.projection(&text(&["LocationID"]));
        assert!(projection.starts_with("CASE WHEN \"LocationID\" IS NULL OR regexp_full_match("));
        assert!(projection.contains("THEN CAST(\"LocationID\" AS BIGINT)"));
        assert!(projection.contains("ELSE error("));
        assert!(projection.ends_with("END AS \"LocationID\""));

        let fractional = [SourceColumn::new("VendorID", "DOUBLE")];
        assert!(TRIP_SCHEMA
            .projection(&fractional)
            .contains("\"VendorID\" = trunc(\"VendorID\")"));

        let typed = [SourceColumn::new("VendorID", "BIGINT")];
        assert_eq!(
            TRIP_SCHEMA.projection(&typed),
            "CAST(\"VendorID\" AS BIGINT) AS \"VendorID\""
        );
    }

    #[test]
    fn test_projection_passes_undeclared_columns_through() {
        let projection = TRIP_SCHEMA.projection(&[
            SourceColumn::new("airport_fee", "DOUBLE"),
            SourceColumn::new("trip_distance", "VARCHAR"),
        ]);
        assert_eq!(
            projection,
            "\"airport_fee\", CAST(\"trip_distance\" AS DOUBLE) AS \"trip_distance\""
        );
    }

    #[test]
    fn test_missing_columns_are_reported_not_projected() {
        let present = columns(&["LocationID", "Zone"]);
        assert_eq!(ZONE_SCHEMA.missing_columns(&present), vec!["Borough", "service_zone"]);
        assert!(!ZONE_SCHEMA
            .projection(&text(&["LocationID", "Zone"]))
            .contains("Borough"));
    }

    #[test]
    fn test_schema_lookup_by_name() {
        assert_eq!(ColumnSchema::by_name("TRIPS"), Some(TRIP_SCHEMA));
        assert_eq!(ColumnSchema::by_name("none"), Some(PASSTHROUGH_SCHEMA));
        assert_eq!(ColumnSchema::by_name("green"), None);
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_literal("o'neil"), "'o''neil'");
    }
}
