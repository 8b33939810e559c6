use chrono::NaiveDateTime;
use mastertable_parser::{SourceKind, SourceTable};
use polars::prelude::*;
use tracing::info;

use crate::coerce::{parse_numeric, parse_timestamp, to_micros};
use crate::error::{PipelineError, Result};
use crate::observer::{PipelineObserver, PipelineWarning};

pub const TIMESTAMP_COLUMN: &str = "timestamp";

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesRow {
    pub timestamp: NaiveDateTime,
    pub values: Vec<Option<f64>>,
}

impl TimeSeriesRow {
    pub fn new(timestamp: NaiveDateTime, values: Vec<Option<f64>>) -> Self {
        Self { timestamp, values }
    }
}

/// One timestamped source, sorted by time, with every tracked field as a
/// nullable `Float64` column next to a microsecond `timestamp` column.
///
/// Rows sharing a timestamp keep their source order.
#[derive(Debug, Clone)]
pub struct TimeSeriesTable {
    kind: SourceKind,
    fields: Vec<String>,
    timestamps: Vec<i64>,
    frame: DataFrame,
}

/// Contiguous run of rows picked out of a [`TimeSeriesTable`]. The frame is a
/// zero-copy slice of the table's frame.
#[derive(Debug, Clone)]
pub struct RowSelection<'a> {
    timestamps: &'a [i64],
    frame: DataFrame,
}

impl RowSelection<'_> {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Microsecond timestamps, ascending.
    pub fn timestamps(&self) -> &[i64] {
        self.timestamps
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn values(&self, field: &str) -> PolarsResult<&Float64Chunked> {
        self.frame.column(field)?.f64()
    }
}

impl TimeSeriesTable {
    pub fn from_rows(kind: SourceKind, fields: &[&str], rows: Vec<TimeSeriesRow>) -> Result<Self> {
        let rows = rows
            .into_iter()
            .map(|row| (to_micros(row.timestamp), row.values))
            .collect();
        Self::build(kind, fields, rows)
    }

    /// Types a loaded source. The time column is required; tracked fields that
    /// are absent from the header become all-missing columns. Rows with an
    /// unusable timestamp are dropped and reported, bad numbers become missing.
    pub fn from_source(
        source: &SourceTable,
        time_column: &str,
        fields: &[&str],
        observer: &dyn PipelineObserver,
    ) -> Result<Self> {
        let kind = source.kind;
        let time_name = source.require_column(time_column)?;
        let time_values = source.text_column(&time_name)?;

        let mut field_values: Vec<Option<&StringChunked>> = Vec::with_capacity(fields.len());
        for field in fields {
            match source.find_column(field) {
                Some(name) => field_values.push(Some(source.text_column(&name)?)),
                None => {
                    observer.on_warning(PipelineWarning::MissingSourceColumn {
                        kind,
                        column: field.to_string(),
                    });
                    field_values.push(None);
                }
            }
        }

        let mut rows = Vec::with_capacity(source.height());
        for idx in 0..source.height() {
            let raw_time = time_values.get(idx);
            let timestamp = match raw_time.map(parse_timestamp) {
                Some(Ok(timestamp)) => timestamp,
                _ => {
                    observer.on_warning(PipelineWarning::UnparsableTimestamp {
                        kind,
                        row: idx + 1,
                        value: raw_time.map(str::to_string),
                    });
                    continue;
                }
            };

            let values: Vec<Option<f64>> = field_values
                .iter()
                .copied()
                .map(|column| {
                    column
                        .and_then(|values| values.get(idx))
                        .and_then(|raw| parse_numeric(raw).ok())
                })
                .collect();
            rows.push((to_micros(timestamp), values));
        }

        let table = Self::build(kind, fields, rows)?;
        info!(
            source = %kind,
            rows_loaded = source.height(),
            rows_usable = table.len(),
            "Normalized time-series source"
        );
        Ok(table)
    }

    fn build(kind: SourceKind, fields: &[&str], mut rows: Vec<(i64, Vec<Option<f64>>)>) -> Result<Self> {
        if let Some(clash) = fields
            .iter()
            .find(|field| field.eq_ignore_ascii_case(TIMESTAMP_COLUMN))
        {
            return Err(PipelineError::Processing(format!(
                "{kind} field '{clash}' collides with the reserved timestamp column"
            )));
        }

        if let Some((_, values)) = rows.iter().find(|(_, values)| values.len() != fields.len()) {
            return Err(PipelineError::Processing(format!(
                "{kind} row had {} values, expected {}",
                values.len(),
                fields.len()
            )));
        }

        rows.sort_by_key(|(timestamp, _)| *timestamp);
        let timestamps: Vec<i64> = rows.iter().map(|(timestamp, _)| *timestamp).collect();

        let mut columns: Vec<Column> = Vec::with_capacity(fields.len() + 1);
        let ts_series = Series::new(TIMESTAMP_COLUMN.into(), timestamps.clone())
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
        columns.push(ts_series.into());

        for (position, field) in fields.iter().enumerate() {
            let values: Vec<Option<f64>> = rows.iter().map(|(_, values)| values[position]).collect();
            columns.push(Series::new((*field).into(), values).into());
        }

        Ok(Self {
            kind,
            fields: fields.iter().map(|field| field.to_string()).collect(),
            timestamps,
            frame: DataFrame::new(columns)?,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Rows with `start <= timestamp <= end`.
    ///
    /// With one bound missing the range is open on that side. With both
    /// missing nothing is selected; use [`TimeSeriesTable::select_all`] for
    /// the full table. `start > end` selects nothing.
    pub fn select_range(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> RowSelection<'_> {
        let (lower, upper) = match (start, end) {
            (Some(start), Some(end)) => {
                if start > end {
                    return self.slice(0, 0);
                }
                (self.lower_bound(start), self.upper_bound(end))
            }
            (Some(start), None) => (self.lower_bound(start), self.len()),
            (None, Some(end)) => (0, self.upper_bound(end)),
            (None, None) => (0, 0),
        };
        self.slice(lower, upper)
    }

    pub fn select_all(&self) -> RowSelection<'_> {
        self.slice(0, self.len())
    }

    fn lower_bound(&self, start: NaiveDateTime) -> usize {
        let start = to_micros(start);
        self.timestamps.partition_point(|&timestamp| timestamp < start)
    }

    fn upper_bound(&self, end: NaiveDateTime) -> usize {
        let end = to_micros(end);
        self.timestamps.partition_point(|&timestamp| timestamp <= end)
    }

    fn slice(&self, lower: usize, upper: usize) -> RowSelection<'_> {
        let upper = upper.max(lower);
        RowSelection {
            timestamps: &self.timestamps[lower..upper],
            frame: self.frame.slice(lower as i64, upper - lower),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::CollectingObserver;
    use mastertable_parser::parse_source_table;

    fn at(hm: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("2024-03-01 {hm}:00"), "%Y-%m-%d %H:%M:%S")
            .unwrap()
    }

    fn table() -> TimeSeriesTable {
        TimeSeriesTable::from_rows(
            SourceKind::ProcessParameters,
            &["p1"],
            vec![
                TimeSeriesRow::new(at("10:05"), vec![Some(7.0)]),
                TimeSeriesRow::new(at("10:00"), vec![Some(1.0)]),
                TimeSeriesRow::new(at("10:05"), vec![Some(8.0)]),
                TimeSeriesRow::new(at("10:10"), vec![Some(3.0)]),
                TimeSeriesRow::new(at("10:20"), vec![None]),
            ],
        )
        .unwrap()
    }

    fn p1(selection: &RowSelection<'_>) -> Vec<Option<f64>> {
        selection.values("p1").unwrap().into_iter().collect()
    }

    #[test]
    fn rows_are_sorted_stably_by_timestamp() {
        let table = table();
        assert_eq!(
            p1(&table.select_all()),
            vec![Some(1.0), Some(7.0), Some(8.0), Some(3.0), None]
        );
    }

    #[test]
    fn closed_range_includes_both_bounds_and_duplicates() {
        let table = table();
        let selection = table.select_range(Some(at("10:05")), Some(at("10:10")));
        assert_eq!(selection.len(), 3);
        assert_eq!(p1(&selection), vec![Some(7.0), Some(8.0), Some(3.0)]);
    }

    #[test]
    fn inverted_range_is_empty() {
        let table = table();
        let selection = table.select_range(Some(at("10:10")), Some(at("10:00")));
        assert!(selection.is_empty());
        assert_eq!(selection.frame().height(), 0);
    }

    #[test]
    fn half_open_ranges_follow_present_bound() {
        let table = table();
        assert_eq!(table.select_range(Some(at("10:06")), None).len(), 2);
        assert_eq!(table.select_range(None, Some(at("10:05"))).len(), 3);
    }

    #[test]
    fn unbounded_range_selects_nothing() {
        let table = table();
        assert!(table.select_range(None, None).is_empty());
        assert_eq!(table.select_all().len(), 5);
    }

    #[test]
    fn range_outside_data_is_empty() {
        let table = table();
        assert!(table
            .select_range(Some(at("11:00")), Some(at("12:00")))
            .is_empty());
        assert!(table
            .select_range(Some(at("08:00")), Some(at("09:00")))
            .is_empty());
    }

    #[test]
    fn mismatched_row_width_is_rejected() {
        let err = TimeSeriesTable::from_rows(
            SourceKind::ProcessParameters,
            &["p1", "p2"],
            vec![TimeSeriesRow::new(at("10:00"), vec![Some(1.0)])],
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Processing(_)));
    }

    #[test]
    fn from_source_coerces_values_and_reports_problems() {
        let source = parse_source_table(
            SourceKind::OperationalTelemetry,
            "Time,Valve Position,pump_speed\n\
             2024-03-01 10:00:00,0,1500\n\
             yesterday,1,1600\n\
             2024-03-01 10:01:00,open,\n",
        )
        .unwrap();
        let observer = CollectingObserver::new();

        let table = TimeSeriesTable::from_source(
            &source,
            "time",
            &["valve_position", "pump_speed", "flow_rate"],
            &observer,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.fields(), &["valve_position", "pump_speed", "flow_rate"]);

        let all = table.select_all();
        let valve: Vec<Option<f64>> = all.values("valve_position").unwrap().into_iter().collect();
        let pump: Vec<Option<f64>> = all.values("pump_speed").unwrap().into_iter().collect();
        let flow: Vec<Option<f64>> = all.values("flow_rate").unwrap().into_iter().collect();
        assert_eq!(valve, vec![Some(0.0), None]);
        assert_eq!(pump, vec![Some(1500.0), None]);
        assert_eq!(flow, vec![None, None]);

        assert_eq!(observer.count("unparsable_timestamp"), 1);
        assert_eq!(observer.count("missing_source_column"), 1);
        assert_eq!(
            observer.warnings()[1],
            PipelineWarning::UnparsableTimestamp {
                kind: SourceKind::OperationalTelemetry,
                row: 2,
                value: Some("yesterday".into()),
            }
        );
    }

    #[test]
    fn from_source_requires_time_column() {
        let source =
            parse_source_table(SourceKind::ProcessParameters, "When,Parameter1\nx,1\n").unwrap();
        let err = TimeSeriesTable::from_source(
            &source,
            "Time",
            &["Parameter1"],
            &CollectingObserver::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Source(_)));
    }

    #[test]
    fn reserved_column_name_is_rejected() {
        let err =
            TimeSeriesTable::from_rows(SourceKind::ProcessParameters, &["Timestamp"], Vec::new())
                .unwrap_err();
        assert!(matches!(err, PipelineError::Processing(_)));
    }
}
