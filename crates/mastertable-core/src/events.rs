use std::collections::HashMap;

use chrono::NaiveDateTime;
use mastertable_parser::SourceTable;
use polars::prelude::StringChunked;
use tracing::info;

use crate::coerce::parse_timestamp;
use crate::config::EventSchema;
use crate::error::Result;
use crate::observer::{PipelineObserver, PipelineWarning, WindowBound};

/// A named interval of one batch. Raw bound text is kept for the output even
/// when it could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct EventWindow {
    pub name: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub raw_start: Option<String>,
    pub raw_end: Option<String>,
}

impl EventWindow {
    pub fn new(name: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            start: Some(start),
            end: Some(end),
            raw_start: Some(start.format("%Y-%m-%d %H:%M:%S").to_string()),
            raw_end: Some(end.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: None,
            end: None,
            raw_start: None,
            raw_end: None,
        }
    }

    /// Both bounds parsed. Unresolved windows produce only missing values.
    pub fn is_resolved(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start > end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchWindows {
    pub batch_id: String,
    pub windows: Vec<EventWindow>,
}

impl BatchWindows {
    pub fn window(&self, event: &str) -> Option<&EventWindow> {
        self.windows.iter().find(|window| window.name == event)
    }
}

/// Batches of the event source keyed by id, remembering source order.
#[derive(Debug, Clone, Default)]
pub struct BatchEventIndex {
    order: Vec<String>,
    batches: HashMap<String, BatchWindows>,
}

impl BatchEventIndex {
    /// Adds a batch unless its id is already present. Returns whether it was added.
    pub fn insert(&mut self, batch: BatchWindows) -> bool {
        if self.batches.contains_key(&batch.batch_id) {
            return false;
        }
        self.order.push(batch.batch_id.clone());
        self.batches.insert(batch.batch_id.clone(), batch);
        true
    }

    pub fn batch_ids(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, batch_id: &str) -> Option<&BatchWindows> {
        self.batches.get(batch_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchWindows> {
        self.order.iter().filter_map(|id| self.batches.get(id))
    }
}

struct EventColumns<'a> {
    name: &'a str,
    start: Option<&'a StringChunked>,
    end: Option<&'a StringChunked>,
}

/// Builds the per-batch event windows from the batch-event source.
///
/// Only a missing batch id column is an error. Every other defect degrades
/// the affected windows and is reported to `observer`.
pub fn extract_event_windows(
    source: &SourceTable,
    schema: &EventSchema,
    event_names: &[String],
    observer: &dyn PipelineObserver,
) -> Result<BatchEventIndex> {
    let batch_column = source.require_column(&schema.batch_id_column)?;
    let batch_ids = source.text_column(&batch_column)?;

    let mut events = Vec::with_capacity(event_names.len());
    for name in event_names {
        let start = lookup_column(source, &schema.start_column(name), observer)?;
        let end = lookup_column(source, &schema.end_column(name), observer)?;
        events.push(EventColumns { name, start, end });
    }

    let mut index = BatchEventIndex::default();
    for idx in 0..source.height() {
        let row = idx + 1;
        let Some(batch_id) = batch_ids.get(idx) else {
            observer.on_warning(PipelineWarning::MissingBatchId { row });
            continue;
        };

        if index.get(batch_id).is_some() {
            observer.on_warning(PipelineWarning::DuplicateBatchId {
                batch_id: batch_id.to_string(),
                row,
            });
            continue;
        }

        let windows = events
            .iter()
            .map(|columns| extract_window(batch_id, columns, idx, observer))
            .collect();
        index.insert(BatchWindows {
            batch_id: batch_id.to_string(),
            windows,
        });
    }

    info!(
        batches = index.len(),
        events = event_names.len(),
        "Extracted event windows"
    );
    Ok(index)
}

fn lookup_column<'a>(
    source: &'a SourceTable,
    column: &str,
    observer: &dyn PipelineObserver,
) -> Result<Option<&'a StringChunked>> {
    match source.find_column(column) {
        Some(name) => Ok(Some(source.text_column(&name)?)),
        None => {
            observer.on_warning(PipelineWarning::MissingSourceColumn {
                kind: source.kind,
                column: column.to_string(),
            });
            Ok(None)
        }
    }
}

fn extract_window(
    batch_id: &str,
    columns: &EventColumns<'_>,
    idx: usize,
    observer: &dyn PipelineObserver,
) -> EventWindow {
    let raw_start = columns.start.and_then(|values| values.get(idx));
    let raw_end = columns.end.and_then(|values| values.get(idx));

    let start = parse_bound(
        batch_id,
        columns.name,
        WindowBound::Start,
        columns.start.is_some(),
        raw_start,
        observer,
    );
    let end = parse_bound(
        batch_id,
        columns.name,
        WindowBound::End,
        columns.end.is_some(),
        raw_end,
        observer,
    );

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            observer.on_warning(PipelineWarning::InvertedWindow {
                batch_id: batch_id.to_string(),
                event: columns.name.to_string(),
                start,
                end,
            });
        }
    }

    EventWindow {
        name: columns.name.to_string(),
        start,
        end,
        raw_start: raw_start.map(str::to_string),
        raw_end: raw_end.map(str::to_string),
    }
}

fn parse_bound(
    batch_id: &str,
    event: &str,
    bound: WindowBound,
    column_present: bool,
    raw: Option<&str>,
    observer: &dyn PipelineObserver,
) -> Option<NaiveDateTime> {
    let Some(raw) = raw else {
        // an absent column was already reported once
        if column_present {
            observer.on_warning(PipelineWarning::MissingEventBound {
                batch_id: batch_id.to_string(),
                event: event.to_string(),
                bound,
            });
        }
        return None;
    };

    match parse_timestamp(raw) {
        Ok(timestamp) => Some(timestamp),
        Err(_) => {
            observer.on_warning(PipelineWarning::UnparsableEventBound {
                batch_id: batch_id.to_string(),
                event: event.to_string(),
                bound,
                value: raw.to_string(),
            });
            None
        }
    }
}
