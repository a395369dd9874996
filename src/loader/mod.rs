//! CSV loader for raw revenue records.
//!
//! This module maps configured column names onto [`RawRecord`]s and
//! converts the value column to numbers.

use crate::config::{ColumnsConfig, Config};
use crate::error::{PipelineError, Result};
use crate::models::RawRecord;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Configuration for reading a CSV dataset.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Header names of the four required columns.
    pub columns: ColumnsConfig,
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Parse values as `1.234,56` instead of `1234.56`.
    pub decimal_comma: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            columns: ColumnsConfig::default(),
            delimiter: b',',
            decimal_comma: false,
        }
    }
}

impl TryFrom<&Config> for LoadConfig {
    type Error = PipelineError;

    /// Fails when the configured delimiter is not a single ASCII character.
    fn try_from(config: &Config) -> Result<Self> {
        let delimiter = config.input.delimiter;
        if !delimiter.is_ascii() {
            return Err(PipelineError::InvalidParameter {
                name: "delimiter".to_string(),
                reason: format!("{:?} is not a single ASCII character", delimiter),
            });
        }

        Ok(Self {
            columns: config.columns.clone(),
            delimiter: delimiter as u8,
            decimal_comma: config.input.decimal_comma,
        })
    }
}

/// Positions of the required columns within a header row.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    region: usize,
    year: usize,
    revenue_type: usize,
    value: usize,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, columns: &ColumnsConfig) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
                .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            region: find(columns.region.as_str())?,
            year: find(columns.year.as_str())?,
            revenue_type: find(columns.revenue_type.as_str())?,
            value: find(columns.value.as_str())?,
        })
    }
}

/// Load raw records from a CSV file.
pub fn load_csv(path: &Path, config: &LoadConfig) -> Result<Vec<RawRecord>> {
    info!("Loading records from: {}", path.display());
    let file = File::open(path)?;
    read_records(BufReader::new(file), config)
}

/// Read raw records from any CSV source with a header row.
pub fn read_records<R: Read>(reader: R, config: &LoadConfig) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let index = ColumnIndex::resolve(&headers, &config.columns)?;
    debug!("Resolved columns: {:?}", index);

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        let record = result?;
        let field = |idx: usize| record.get(idx).unwrap_or("").to_string();

        let raw_value = field(index.value);
        let value = parse_value(&raw_value, config.decimal_comma)
            .ok_or_else(|| PipelineError::TypeConversion {
                row,
                value: raw_value.clone(),
            })?;

        records.push(RawRecord {
            region: field(index.region),
            year: field(index.year),
            revenue_type: field(index.revenue_type),
            value,
        });
    }

    debug!("Read {} records", records.len());
    Ok(records)
}

/// Parse a numeric field. Returns `None` for empty, non-numeric or non-finite input.
pub fn parse_value(raw: &str, decimal_comma: bool) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = if decimal_comma {
        trimmed.replace('.', "").replace(',', ".").parse::<f64>()
    } else {
        trimmed.parse::<f64>()
    };

    parsed.ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "UF,Ano,Tipo de arrecadação,Valor\n\
                          SP,2020,ICMS,100\n\
                          SP,2020,ICMS,50.5\n\
                          RJ,2020,ICMS,10\n";

    #[test]
    fn test_read_records() {
        let records = read_records(SAMPLE.as_bytes(), &LoadConfig::default()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0], RawRecord::new("SP", "2020", "ICMS", 100.0));
        assert_eq!(records[1].value, 50.5);
        assert_eq!(records[2].region, "RJ");
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let data = "Valor,Tipo de arrecadação,UF,Ano\n7,IPVA,MG,2019\n";
        let records = read_records(data.as_bytes(), &LoadConfig::default()).unwrap();
        assert_eq!(records, vec![RawRecord::new("MG", "2019", "IPVA", 7.0)]);
    }

    #[test]
    fn test_missing_column() {
        let data = "UF,Ano,Valor\nSP,2020,1\n";
        let err = read_records(data.as_bytes(), &LoadConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(ref c) if c == "Tipo de arrecadação"));
    }

    #[test]
    fn test_non_numeric_value() {
        let data = "UF,Ano,Tipo de arrecadação,Valor\nSP,2020,ICMS,1\nRJ,2020,ICMS,abc\n";
        let err = read_records(data.as_bytes(), &LoadConfig::default()).unwrap_err();
        match err {
            PipelineError::TypeConversion { row, value } => {
                assert_eq!(row, 2);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_semicolon_and_decimal_comma() {
        let data = "UF;Ano;Tipo de arrecadação;Valor\nSP;2021;ICMS;1.234,56\n";
        let config = LoadConfig {
            delimiter: b';',
            decimal_comma: true,
            ..LoadConfig::default()
        };
        let records = read_records(data.as_bytes(), &config).unwrap();
        assert!((records[0].value - 1234.56).abs() < 1e-9);
    }

    #[test]
    fn test_custom_column_names() {
        let data = "state,year,kind,amount\nBA,2022,ITCMD,3\n";
        let config = LoadConfig {
            columns: ColumnsConfig {
                region: "state".to_string(),
                year: "year".to_string(),
                revenue_type: "kind".to_string(),
                value: "amount".to_string(),
            },
            ..LoadConfig::default()
        };
        let records = read_records(data.as_bytes(), &config).unwrap();
        assert_eq!(records, vec![RawRecord::new("BA", "2022", "ITCMD", 3.0)]);
    }

    #[test]
    fn test_header_only_is_empty() {
        let data = "UF,Ano,Tipo de arrecadação,Valor\n";
        let records = read_records(data.as_bytes(), &LoadConfig::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(" 42 ", false), Some(42.0));
        assert_eq!(parse_value("-3.5", false), Some(-3.5));
        assert_eq!(parse_value("", false), None);
        assert_eq!(parse_value("NaN", false), None);
        assert_eq!(parse_value("inf", false), None);
        assert_eq!(parse_value("1.000.000,5", true), Some(1_000_000.5));
        assert_eq!(parse_value("12,3", false), None);
    }

    #[test]
    fn test_load_config_from_config() {
        let mut config = Config::default();
        config.input.delimiter = ';';
        config.input.decimal_comma = true;

        let load = LoadConfig::try_from(&config).unwrap();
        assert_eq!(load.delimiter, b';');
        assert!(load.decimal_comma);
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        for delimiter in ['→', 'ç'] {
            let mut config = Config::default();
            config.input.delimiter = delimiter;

            let err = LoadConfig::try_from(&config).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidParameter { ref name, .. } if name == "delimiter"));
        }
    }

    #[test]
    fn test_non_ascii_delimiter_from_config_file() {
        let config: Config = toml::from_str("[input]\ndelimiter = \"→\"\n").unwrap();
        assert!(LoadConfig::try_from(&config).is_err());
    }

    #[test]
    fn test_load_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let records = load_csv(file.path(), &LoadConfig::default()).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_load_csv_missing_file() {
        let err = load_csv(Path::new("/nonexistent/data.csv"), &LoadConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
