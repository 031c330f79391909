use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::SourceError;

// Enum that represents the supported source formats
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FileType {
    Csv,
    GzipCsv,
    Parquet,
    Zip,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::Csv => "CSV",
            FileType::GzipCsv => "CSV (gzip)",
            FileType::Parquet => "Parquet",
            FileType::Zip => "ZIP",
        };
        write!(f, "{}", name)
    }
}

// Number of leading lines inspected when sniffing CSV content
const SNIFF_LINES: usize = 5;
const SNIFF_BYTES: u64 = 64 * 1024;

pub fn is_remote(location: &str) -> bool {
    ["http://", "https://", "s3://"]
        .iter()
        .any(|scheme| location.starts_with(scheme))
}

// Determine the file type based on the magic numbers, then content, then extension
pub fn determine_file_type(file_path: &str) -> Result<FileType, SourceError> {
    let mut file = File::open(file_path)?;
    let mut header_buffer = [0u8; 16];
    let bytes_read = file.read(&mut header_buffer)?;
    let header = &header_buffer[..bytes_read];

    if let Some(file_type) = match_magic_numbers(header) {
        return Ok(file_type);
    }

    let mut buffer = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.take(SNIFF_BYTES).read_to_end(&mut buffer)?;
    if let Ok(text) = std::str::from_utf8(&buffer) {
        if is_valid_csv(text) {
            return Ok(FileType::Csv);
        }
    }

    file_type_from_extension(file_path).ok_or(SourceError::UnknownFormat)
}

pub fn match_magic_numbers(buffer: &[u8]) -> Option<FileType> {
    match buffer {
        // gzip member header
        [0x1F, 0x8B, ..] => Some(FileType::GzipCsv),
        // PAR1
        [0x50, 0x41, 0x52, 0x31, ..] => Some(FileType::Parquet),
        // PKZip local file header
        [0x50, 0x4B, 0x03, 0x04, ..] => Some(FileType::Zip),
        _ => None,
    }
}

pub fn file_type_from_extension(location: &str) -> Option<FileType> {
    let name = Path::new(location)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(location)
        .to_ascii_lowercase();

    if name.ends_with(".csv.gz") || name.ends_with(".gz") {
        Some(FileType::GzipCsv)
    } else if name.ends_with(".csv") {
        Some(FileType::Csv)
    } else if name.ends_with(".parquet") {
        Some(FileType::Parquet)
    } else if name.ends_with(".zip") {
        Some(FileType::Zip)
    } else {
        None
    }
}

// At least two columns and consistent field counts over the first lines
pub fn is_valid_csv(content: &str) -> bool {
    let lines: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let Some(first) = lines.first() else {
        return false;
    };
    let first_line_fields = count_fields(first);

    // The final sniffed line may be cut off by the read limit
    let complete = if lines.len() == SNIFF_LINES {
        &lines[1..lines.len() - 1]
    } else {
        &lines[1..]
    };

    first_line_fields >= 2
        && complete
            .iter()
            .all(|line| count_fields(line) == first_line_fields)
}

// Count comma separated fields, ignoring commas inside double quotes
fn count_fields(line: &str) -> usize {
    let mut in_quotes = false;
    let mut fields = 1;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields += 1,
            _ => {}
        }
    }
    fields
}
