use std::fs;
use std::io::Cursor;
use std::path::Path;

use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use tracing::info;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    /// `.parquet` (any case) selects Parquet; everything else is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => OutputFormat::Parquet,
            _ => OutputFormat::Csv,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

pub fn create_csv_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut clone = df.clone();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(&mut clone)?;
    Ok(buffer)
}

pub fn create_parquet_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        let mut clone = df.clone();
        ParquetWriter::new(&mut cursor)
            .with_compression(ParquetCompression::Zstd(None))
            .with_statistics(StatisticsOptions::default())
            .finish(&mut clone)?;
    }
    Ok(buffer)
}

pub fn encode(df: &DataFrame, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Csv => create_csv_bytes(df),
        OutputFormat::Parquet => create_parquet_bytes(df),
    }
}

/// Serializes the whole table first, so a failed encode leaves no partial file.
pub fn write_master_table(df: &DataFrame, path: &Path) -> Result<OutputFormat> {
    let format = OutputFormat::from_path(path);
    let bytes = encode(df, format)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &bytes)?;

    info!(
        path = %path.display(),
        format = format.as_str(),
        rows = df.height(),
        columns = df.width(),
        bytes = bytes.len(),
        "Wrote master table"
    );
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn frame() -> DataFrame {
        df!(
            "Batch_ID" => ["B1", "B2"],
            "E1_start" => [Some("2024-03-01 10:00:00"), None],
            "E1_AvgPara1" => [7.0, f64::NAN],
        )
        .unwrap()
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("out/Master.parquet")), OutputFormat::Parquet);
        assert_eq!(OutputFormat::from_path(Path::new("Master.PARQUET")), OutputFormat::Parquet);
        assert_eq!(OutputFormat::from_path(Path::new("Master_table.csv")), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path(Path::new("Master_table")), OutputFormat::Csv);
    }

    #[test]
    fn csv_keeps_nulls_empty_and_missing_stats_as_nan() {
        let text = String::from_utf8(create_csv_bytes(&frame()).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Batch_ID,E1_start,E1_AvgPara1");
        assert_eq!(lines[1], "B1,2024-03-01 10:00:00,7.0");
        assert_eq!(lines[2], "B2,,NaN");
    }

    #[test]
    fn parquet_round_trips_through_reader() {
        let bytes = create_parquet_bytes(&frame()).unwrap();
        let back = ParquetReader::new(Cursor::new(bytes)).finish().unwrap();
        assert_eq!(back.shape(), (2, 3));
        let avg = back.column("E1_AvgPara1").unwrap().f64().unwrap();
        assert_eq!(avg.get(0), Some(7.0));
        assert!(avg.get(1).unwrap().is_nan());
    }
}
