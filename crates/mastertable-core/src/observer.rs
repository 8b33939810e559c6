use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::NaiveDateTime;
use mastertable_parser::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowBound {
    Start,
    End,
}

impl WindowBound {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowBound::Start => "start",
            WindowBound::End => "end",
        }
    }
}

impl fmt::Display for WindowBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recoverable problems found while building the master table. None of these
/// stop a run; the affected cells end up missing.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    MissingSourceColumn {
        kind: SourceKind,
        column: String,
    },
    UnparsableTimestamp {
        kind: SourceKind,
        row: usize,
        value: Option<String>,
    },
    MissingBatchId {
        row: usize,
    },
    DuplicateBatchId {
        batch_id: String,
        row: usize,
    },
    MissingEventBound {
        batch_id: String,
        event: String,
        bound: WindowBound,
    },
    UnparsableEventBound {
        batch_id: String,
        event: String,
        bound: WindowBound,
        value: String,
    },
    InvertedWindow {
        batch_id: String,
        event: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    EmptyWindow {
        batch_id: String,
        event: String,
        kind: SourceKind,
    },
    MissingEventRow {
        batch_id: String,
    },
}

impl PipelineWarning {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineWarning::MissingSourceColumn { .. } => "missing_source_column",
            PipelineWarning::UnparsableTimestamp { .. } => "unparsable_timestamp",
            PipelineWarning::MissingBatchId { .. } => "missing_batch_id",
            PipelineWarning::DuplicateBatchId { .. } => "duplicate_batch_id",
            PipelineWarning::MissingEventBound { .. } => "missing_event_bound",
            PipelineWarning::UnparsableEventBound { .. } => "unparsable_event_bound",
            PipelineWarning::InvertedWindow { .. } => "inverted_window",
            PipelineWarning::EmptyWindow { .. } => "empty_window",
            PipelineWarning::MissingEventRow { .. } => "missing_event_row",
        }
    }
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::MissingSourceColumn { kind, column } => {
                write!(f, "{kind} source has no column '{column}'; treating it as missing")
            }
            PipelineWarning::UnparsableTimestamp { kind, row, value } => match value {
                Some(value) => write!(
                    f,
                    "{kind} row {row} dropped: timestamp '{value}' could not be parsed"
                ),
                None => write!(f, "{kind} row {row} dropped: timestamp is empty"),
            },
            PipelineWarning::MissingBatchId { row } => {
                write!(f, "batch_events row {row} skipped: batch id is empty")
            }
            PipelineWarning::DuplicateBatchId { batch_id, row } => write!(
                f,
                "batch_events row {row} ignored: batch {batch_id} already seen"
            ),
            PipelineWarning::MissingEventBound {
                batch_id,
                event,
                bound,
            } => write!(f, "batch {batch_id} {event}: {bound} time is missing"),
            PipelineWarning::UnparsableEventBound {
                batch_id,
                event,
                bound,
                value,
            } => write!(
                f,
                "batch {batch_id} {event}: {bound} time '{value}' could not be parsed"
            ),
            PipelineWarning::InvertedWindow {
                batch_id,
                event,
                start,
                end,
            } => write!(
                f,
                "batch {batch_id} {event}: start {start} is after end {end}; window is empty"
            ),
            PipelineWarning::EmptyWindow {
                batch_id,
                event,
                kind,
            } => write!(f, "batch {batch_id} {event}: no {kind} rows in window"),
            PipelineWarning::MissingEventRow { batch_id } => {
                write!(f, "batch {batch_id} has no batch_events row")
            }
        }
    }
}

/// Sink for [`PipelineWarning`]s. Shared across batches, possibly from several
/// threads at once.
pub trait PipelineObserver: Send + Sync {
    fn on_warning(&self, warning: PipelineWarning);
}

/// Forwards warnings to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_warning(&self, warning: PipelineWarning) {
        tracing::warn!(code = warning.code(), "{warning}");
    }
}

/// Keeps every warning in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    warnings: Mutex<Vec<PipelineWarning>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<PipelineWarning> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, code: &str) -> usize {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|warning| warning.code() == code)
            .count()
    }
}

impl PipelineObserver for CollectingObserver {
    fn on_warning(&self, warning: PipelineWarning) {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(warning);
    }
}

/// Counts warnings on their way to another observer.
pub(crate) struct CountingObserver<'a> {
    inner: &'a dyn PipelineObserver,
    count: AtomicUsize,
}

impl<'a> CountingObserver<'a> {
    pub(crate) fn new(inner: &'a dyn PipelineObserver) -> Self {
        Self {
            inner,
            count: AtomicUsize::new(0),
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl PipelineObserver for CountingObserver<'_> {
    fn on_warning(&self, warning: PipelineWarning) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.inner.on_warning(warning);
    }
}
