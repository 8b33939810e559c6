use std::fmt;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::aggregate::{aggregate_numeric_field, point_sample_at_start, FieldStats};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::events::{BatchEventIndex, BatchWindows, EventWindow};
use crate::observer::{PipelineObserver, PipelineWarning};
use crate::table::TimeSeriesTable;
use crate::valve::ValveStatus;

pub const BATCH_ID_COLUMN: &str = "Batch_ID";

/// Lifecycle of one batch on its way to a [`MasterRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Pending,
    WindowsResolved,
    StatsComputed,
    RowEmitted,
}

impl BatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStage::Pending => "pending",
            BatchStage::WindowsResolved => "windows_resolved",
            BatchStage::StatsComputed => "stats_computed",
            BatchStage::RowEmitted => "row_emitted",
        }
    }
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived values of one event window.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    pub event: String,
    /// Raw bound text as found in the event source.
    pub start: Option<String>,
    pub end: Option<String>,
    pub valve_position_at_start: Option<f64>,
    pub valve_status_at_start: ValveStatus,
    pub avg_pump_speed: Option<f64>,
    /// One entry per configured process parameter, in configured order.
    pub parameters: Vec<FieldStats>,
}

impl EventSummary {
    fn missing(window: &EventWindow, parameter_count: usize) -> Self {
        Self {
            event: window.name.clone(),
            start: window.raw_start.clone(),
            end: window.raw_end.clone(),
            valve_position_at_start: None,
            valve_status_at_start: ValveStatus::Unknown,
            avg_pump_speed: None,
            parameters: vec![FieldStats::missing(); parameter_count],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MasterRow {
    pub batch_id: String,
    pub events: Vec<EventSummary>,
}

impl MasterRow {
    pub fn event(&self, name: &str) -> Option<&EventSummary> {
        self.events.iter().find(|summary| summary.event == name)
    }
}

/// A batch id and its event row, if the event source had one.
#[derive(Debug, Clone)]
pub struct PendingBatch<'a> {
    batch_id: String,
    windows: Option<&'a BatchWindows>,
}

impl<'a> PendingBatch<'a> {
    pub fn new(batch_id: impl Into<String>, windows: Option<&'a BatchWindows>) -> Self {
        Self {
            batch_id: batch_id.into(),
            windows,
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// Lines the batch's windows up with the configured event list. Events
    /// the batch has no window for become unresolved.
    pub fn resolve(
        self,
        event_names: &[String],
        observer: &dyn PipelineObserver,
    ) -> ResolvedBatch {
        if self.windows.is_none() {
            observer.on_warning(PipelineWarning::MissingEventRow {
                batch_id: self.batch_id.clone(),
            });
        }

        let windows = event_names
            .iter()
            .map(|name| {
                self.windows
                    .and_then(|batch| batch.window(name))
                    .cloned()
                    .unwrap_or_else(|| EventWindow::unresolved(name.as_str()))
            })
            .collect();

        debug!(
            batch_id = %self.batch_id,
            stage = %BatchStage::WindowsResolved,
            "Batch stage transition"
        );
        ResolvedBatch {
            batch_id: self.batch_id,
            windows,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedBatch {
    batch_id: String,
    windows: Vec<EventWindow>,
}

impl ResolvedBatch {
    pub fn windows(&self) -> &[EventWindow] {
        &self.windows
    }

    pub fn compute(self, sources: &WindowSources<'_>) -> Result<ComputedBatch> {
        let events = self
            .windows
            .iter()
            .map(|window| sources.summarize(&self.batch_id, window))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            batch_id = %self.batch_id,
            stage = %BatchStage::StatsComputed,
            "Batch stage transition"
        );
        Ok(ComputedBatch {
            batch_id: self.batch_id,
            events,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ComputedBatch {
    batch_id: String,
    events: Vec<EventSummary>,
}

impl ComputedBatch {
    pub fn emit(self) -> MasterRow {
        debug!(
            batch_id = %self.batch_id,
            stage = %BatchStage::RowEmitted,
            "Batch stage transition"
        );
        MasterRow {
            batch_id: self.batch_id,
            events: self.events,
        }
    }
}

/// Both time-series tables plus the fields to read from them.
pub struct WindowSources<'a> {
    process: &'a TimeSeriesTable,
    telemetry: &'a TimeSeriesTable,
    parameter_columns: Vec<&'a str>,
    valve_column: &'a str,
    pump_column: &'a str,
    observer: &'a dyn PipelineObserver,
}

impl WindowSources<'_> {
    fn summarize(&self, batch_id: &str, window: &EventWindow) -> Result<EventSummary> {
        if !window.is_resolved() {
            return Ok(EventSummary::missing(window, self.parameter_columns.len()));
        }

        let telemetry_rows = self.telemetry.select_range(window.start, window.end);
        let process_rows = self.process.select_range(window.start, window.end);

        // inverted windows were already reported by the extractor
        if !window.is_inverted() {
            for (rows_empty, kind) in [
                (telemetry_rows.is_empty(), self.telemetry.kind()),
                (process_rows.is_empty(), self.process.kind()),
            ] {
                if rows_empty {
                    self.observer.on_warning(PipelineWarning::EmptyWindow {
                        batch_id: batch_id.to_string(),
                        event: window.name.clone(),
                        kind,
                    });
                }
            }
        }

        let valve_position =
            point_sample_at_start(&telemetry_rows, self.valve_column, window.start)?;
        let avg_pump_speed = aggregate_numeric_field(&telemetry_rows, self.pump_column)?.mean;
        let parameters = self
            .parameter_columns
            .iter()
            .map(|column| aggregate_numeric_field(&process_rows, column))
            .collect::<PolarsResult<Vec<_>>>()?;

        Ok(EventSummary {
            event: window.name.clone(),
            start: window.raw_start.clone(),
            end: window.raw_end.clone(),
            valve_position_at_start: valve_position,
            valve_status_at_start: ValveStatus::from_position(valve_position),
            avg_pump_speed,
            parameters,
        })
    }
}

/// Drives every batch through the stages and collects the rows.
pub struct MasterRecordBuilder<'a> {
    config: &'a PipelineConfig,
    sources: WindowSources<'a>,
}

impl<'a> MasterRecordBuilder<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        process: &'a TimeSeriesTable,
        telemetry: &'a TimeSeriesTable,
        observer: &'a dyn PipelineObserver,
    ) -> Self {
        Self {
            config,
            sources: WindowSources {
                process,
                telemetry,
                parameter_columns: config.process.columns(),
                valve_column: &config.telemetry.valve_column,
                pump_column: &config.telemetry.pump_column,
                observer,
            },
        }
    }

    /// Event-source order, then expected batches the event source lacks.
    pub fn batch_order<'b>(&self, index: &'b BatchEventIndex) -> Vec<PendingBatch<'b>> {
        let mut pending: Vec<PendingBatch<'b>> = index
            .iter()
            .map(|batch| PendingBatch::new(batch.batch_id.as_str(), Some(batch)))
            .collect();

        pending.extend(
            self.config
                .expected_batches
                .iter()
                .filter(|batch_id| index.get(batch_id).is_none())
                .map(|batch_id| PendingBatch::new(batch_id.as_str(), None)),
        );
        pending
    }

    pub fn build_row(&self, pending: PendingBatch<'_>) -> Result<MasterRow> {
        debug!(
            batch_id = %pending.batch_id(),
            stage = %BatchStage::Pending,
            "Batch stage transition"
        );
        let resolved = pending.resolve(&self.config.event_names, self.sources.observer);
        Ok(resolved.compute(&self.sources)?.emit())
    }

    pub fn build(&self, index: &BatchEventIndex) -> Result<MasterTable> {
        let pending = self.batch_order(index);
        let batch_count = pending.len();

        let rows = if self.config.parallel {
            pending
                .into_par_iter()
                .map(|batch| self.build_row(batch))
                .collect::<Result<Vec<_>>>()?
        } else {
            pending
                .into_iter()
                .map(|batch| self.build_row(batch))
                .collect::<Result<Vec<_>>>()?
        };

        info!(
            batches = batch_count,
            parallel = self.config.parallel,
            "Built master rows"
        );
        Ok(MasterTable {
            event_names: self.config.event_names.clone(),
            parameter_labels: self
                .config
                .parameter_labels()
                .into_iter()
                .map(str::to_string)
                .collect(),
            rows,
        })
    }
}

/// The finished one-row-per-batch table.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterTable {
    event_names: Vec<String>,
    parameter_labels: Vec<String>,
    rows: Vec<MasterRow>,
}

impl MasterTable {
    pub fn new(
        event_names: Vec<String>,
        parameter_labels: Vec<String>,
        rows: Vec<MasterRow>,
    ) -> Self {
        Self {
            event_names,
            parameter_labels,
            rows,
        }
    }

    pub fn rows(&self) -> &[MasterRow] {
        &self.rows
    }

    pub fn row(&self, batch_id: &str) -> Option<&MasterRow> {
        self.rows.iter().find(|row| row.batch_id == batch_id)
    }

    pub fn event_names(&self) -> &[String] {
        &self.event_names
    }

    pub fn parameter_labels(&self) -> &[String] {
        &self.parameter_labels
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec![BATCH_ID_COLUMN.to_string()];
        for event in &self.event_names {
            names.push(format!("{event}_start"));
            names.push(format!("{event}_end"));
            names.push(format!("{event}_ValvePosAtStart"));
            names.push(format!("{event}_ValveStatusAtStart"));
            names.push(format!("{event}_AvgPumpSpd"));
            for label in &self.parameter_labels {
                for (metric, _) in STAT_COLUMNS {
                    names.push(format!("{event}_{metric}{label}"));
                }
            }
        }
        names
    }

    /// Flat output frame. Statistic cells are `Float64` with NaN for missing,
    /// bound text is null when missing.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = Vec::new();
        let batch_ids: Vec<&str> = self.rows.iter().map(|row| row.batch_id.as_str()).collect();
        columns.push(Series::new(BATCH_ID_COLUMN.into(), batch_ids).into());

        for (position, event) in self.event_names.iter().enumerate() {
            let events: Vec<Option<&EventSummary>> =
                self.rows.iter().map(|row| row.events.get(position)).collect();

            let starts: Vec<Option<&str>> = events
                .iter()
                .map(|summary| summary.and_then(|s| s.start.as_deref()))
                .collect();
            columns.push(Series::new(format!("{event}_start").into(), starts).into());

            let ends: Vec<Option<&str>> = events
                .iter()
                .map(|summary| summary.and_then(|s| s.end.as_deref()))
                .collect();
            columns.push(Series::new(format!("{event}_end").into(), ends).into());

            let valve: Vec<f64> = events
                .iter()
                .map(|summary| nan_if_missing(summary.and_then(|s| s.valve_position_at_start)))
                .collect();
            columns.push(Series::new(format!("{event}_ValvePosAtStart").into(), valve).into());

            let status: Vec<&str> = events
                .iter()
                .map(|summary| {
                    summary
                        .map(|s| s.valve_status_at_start)
                        .unwrap_or(ValveStatus::Unknown)
                        .as_str()
                })
                .collect();
            columns.push(Series::new(format!("{event}_ValveStatusAtStart").into(), status).into());

            let pump: Vec<f64> = events
                .iter()
                .map(|summary| nan_if_missing(summary.and_then(|s| s.avg_pump_speed)))
                .collect();
            columns.push(Series::new(format!("{event}_AvgPumpSpd").into(), pump).into());

            for (parameter, label) in self.parameter_labels.iter().enumerate() {
                let stats: Vec<FieldStats> = events
                    .iter()
                    .map(|summary| {
                        summary
                            .and_then(|s| s.parameters.get(parameter).copied())
                            .unwrap_or_default()
                    })
                    .collect();

                for (metric, pick) in STAT_COLUMNS {
                    let values: Vec<f64> = stats.iter().map(|s| nan_if_missing(pick(s))).collect();
                    columns.push(Series::new(format!("{event}_{metric}{label}").into(), values).into());
                }
            }
        }

        DataFrame::new(columns)
    }

    /// Derived cells holding the missing sentinel. Valve status is always a
    /// label and never counts.
    pub fn missing_cell_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.events.iter())
            .map(|event| {
                let bounds = usize::from(event.start.is_none()) + usize::from(event.end.is_none());
                let telemetry = usize::from(event.valve_position_at_start.is_none())
                    + usize::from(event.avg_pump_speed.is_none());
                let stats: usize = event
                    .parameters
                    .iter()
                    .map(|s| {
                        [s.mean, s.std_dev, s.max, s.min]
                            .iter()
                            .filter(|value| value.is_none())
                            .count()
                    })
                    .sum();
                bounds + telemetry + stats
            })
            .sum()
    }
}

type StatPicker = fn(&FieldStats) -> Option<f64>;

const STAT_COLUMNS: [(&str, StatPicker); 4] = [
    ("Avg", |s| s.mean),
    ("SD", |s| s.std_dev),
    ("Max", |s| s.max),
    ("Min", |s| s.min),
];

fn nan_if_missing(value: Option<f64>) -> f64 {
    value.unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::extract_event_windows;
    use crate::observer::CollectingObserver;
    use crate::table::TimeSeriesRow;
    use chrono::NaiveDateTime;
    use mastertable_parser::{parse_source_table, SourceKind};

    fn at(hm: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("2024-03-01 {hm}:00"), "%Y-%m-%d %H:%M:%S")
            .unwrap()
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig {
            event_names: vec!["E1".into(), "E2".into()],
            ..PipelineConfig::default()
        };
        config.process.parameters.truncate(1);
        config
    }

    fn process() -> TimeSeriesTable {
        TimeSeriesTable::from_rows(
            SourceKind::ProcessParameters,
            &["Parameter1"],
            [("09:58", 4.0), ("10:02", 5.0), ("10:05", 7.0), ("10:09", 9.0), ("10:15", 11.0)]
                .into_iter()
                .map(|(hm, value)| TimeSeriesRow::new(at(hm), vec![Some(value)]))
                .collect(),
        )
        .unwrap()
    }

    fn telemetry() -> TimeSeriesTable {
        TimeSeriesTable::from_rows(
            SourceKind::OperationalTelemetry,
            &["valve_position", "pump_speed"],
            vec![
                TimeSeriesRow::new(at("09:55"), vec![Some(1.0), Some(1200.0)]),
                TimeSeriesRow::new(at("10:00"), vec![Some(0.0), Some(1500.0)]),
                TimeSeriesRow::new(at("10:04"), vec![Some(0.0), Some(1550.0)]),
            ],
        )
        .unwrap()
    }

    fn index(csv: &str, config: &PipelineConfig, observer: &CollectingObserver) -> BatchEventIndex {
        let source = parse_source_table(SourceKind::BatchEvents, csv).unwrap();
        extract_event_windows(&source, &config.events, &config.event_names, observer).unwrap()
    }

    const EVENTS: &str = "Batch_ID,E1_start,E1_end,E2_start,E2_end\n\
                          B1,2024-03-01 10:00:00,2024-03-01 10:10:00,2024-03-01 12:00:00,2024-03-01 12:30:00\n";

    #[test]
    fn builds_row_from_both_tables() {
        let config = config();
        let (process, telemetry) = (process(), telemetry());
        let observer = CollectingObserver::new();
        let index = index(EVENTS, &config, &observer);

        let table = MasterRecordBuilder::new(&config, &process, &telemetry, &observer)
            .build(&index)
            .unwrap();
        let row = table.row("B1").unwrap();

        let e1 = row.event("E1").unwrap();
        assert_eq!(e1.start.as_deref(), Some("2024-03-01 10:00:00"));
        assert_eq!(e1.valve_position_at_start, Some(0.0));
        assert_eq!(e1.valve_status_at_start, ValveStatus::Closed);
        assert_eq!(e1.avg_pump_speed, Some(1525.0));
        assert_eq!(e1.parameters[0].mean, Some(7.0));
        assert_eq!(e1.parameters[0].std_dev, Some(2.0));

        let e2 = row.event("E2").unwrap();
        assert_eq!(e2.valve_position_at_start, None);
        assert_eq!(e2.valve_status_at_start, ValveStatus::Unknown);
        assert!(e2.parameters[0].is_missing());
        assert_eq!(observer.count("empty_window"), 2);
    }

    #[test]
    fn expected_batches_without_event_row_come_last() {
        let mut config = config();
        config.expected_batches = vec!["B9".into(), "B1".into()];
        let (process, telemetry) = (process(), telemetry());
        let observer = CollectingObserver::new();
        let index = index(EVENTS, &config, &observer);

        let table = MasterRecordBuilder::new(&config, &process, &telemetry, &observer)
            .build(&index)
            .unwrap();

        let ids: Vec<&str> = table.rows().iter().map(|row| row.batch_id.as_str()).collect();
        assert_eq!(ids, vec!["B1", "B9"]);
        let b9 = table.row("B9").unwrap();
        assert_eq!(b9.events.len(), 2);
        assert!(b9.events.iter().all(|event| event.start.is_none()
            && event.valve_status_at_start == ValveStatus::Unknown
            && event.parameters[0].is_missing()));
        assert_eq!(observer.count("missing_event_row"), 1);
    }

    #[test]
    fn inverted_window_yields_missing_cells_without_empty_warning() {
        let config = config();
        let (process, telemetry) = (process(), telemetry());
        let observer = CollectingObserver::new();
        let index = index(
            "Batch_ID,E1_start,E1_end,E2_start,E2_end\n\
             B2,2024-03-01 10:10:00,2024-03-01 10:00:00,,\n",
            &config,
            &observer,
        );

        let table = MasterRecordBuilder::new(&config, &process, &telemetry, &observer)
            .build(&index)
            .unwrap();
        let e1 = table.row("B2").unwrap().event("E1").unwrap();

        assert_eq!(e1.avg_pump_speed, None);
        assert!(e1.parameters[0].is_missing());
        assert_eq!(observer.count("inverted_window"), 1);
        assert_eq!(observer.count("empty_window"), 0);
    }

    #[test]
    fn parallel_build_matches_sequential() {
        let mut config = config();
        let (process, telemetry) = (process(), telemetry());
        let csv = (1..=20).fold(
            String::from("Batch_ID,E1_start,E1_end,E2_start,E2_end\n"),
            |mut csv, n| {
                csv.push_str(&format!(
                    "B{n},2024-03-01 10:00:00,2024-03-01 10:{:02}:00,,\n",
                    n % 15
                ));
                csv
            },
        );
        let observer = CollectingObserver::new();
        let index = index(&csv, &config, &observer);

        let sequential = MasterRecordBuilder::new(&config, &process, &telemetry, &observer)
            .build(&index)
            .unwrap();
        config.parallel = true;
        let parallel = MasterRecordBuilder::new(&config, &process, &telemetry, &observer)
            .build(&index)
            .unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn dataframe_layout_follows_events_then_labels() {
        let config = config();
        let (process, telemetry) = (process(), telemetry());
        let observer = CollectingObserver::new();
        let index = index(EVENTS, &config, &observer);
        let table = MasterRecordBuilder::new(&config, &process, &telemetry, &observer)
            .build(&index)
            .unwrap();

        let df = table.to_dataframe().unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        assert_eq!(names, table.column_names());
        assert_eq!(&names[..7], &[
            "Batch_ID",
            "E1_start",
            "E1_end",
            "E1_ValvePosAtStart",
            "E1_ValveStatusAtStart",
            "E1_AvgPumpSpd",
            "E1_AvgPara1",
        ]);
        assert_eq!(df.width(), 1 + 2 * (5 + 4));

        let avg = df.column("E1_AvgPara1").unwrap().f64().unwrap();
        assert_eq!(avg.get(0), Some(7.0));
        let e2_avg = df.column("E2_AvgPara1").unwrap().f64().unwrap();
        assert!(e2_avg.get(0).unwrap().is_nan());
        let status = df.column("E2_ValveStatusAtStart").unwrap().str().unwrap();
        assert_eq!(status.get(0), Some("Unknown"));
    }

    #[test]
    fn missing_cells_are_counted_per_derived_value() {
        let table = MasterTable::new(
            vec!["E1".into()],
            vec!["Para1".into()],
            vec![MasterRow {
                batch_id: "B1".into(),
                events: vec![EventSummary::missing(&EventWindow::unresolved("E1"), 1)],
            }],
        );
        // two bounds, valve, pump and four stats
        assert_eq!(table.missing_cell_count(), 8);
    }
}
