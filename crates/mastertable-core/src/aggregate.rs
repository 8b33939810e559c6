use chrono::NaiveDateTime;
use polars::prelude::PolarsResult;
use serde::Serialize;

use crate::coerce::to_micros;
use crate::table::RowSelection;

/// Summary statistics of one numeric field over one window. `None` is the
/// missing-value sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FieldStats {
    /// Usable (non-missing) values that went into the statistics.
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1); missing below two values.
    pub std_dev: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
}

impl FieldStats {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self::missing();
        }

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std_dev = if count < 2 {
            None
        } else {
            let squared: f64 = values.iter().map(|value| (value - mean).powi(2)).sum();
            Some((squared / (n - 1.0)).sqrt())
        };
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);

        Self {
            count,
            mean: Some(mean),
            std_dev,
            max: Some(max),
            min: Some(min),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.count == 0
    }
}

/// Mean, sample standard deviation, max and min of `field` over the selected
/// rows, skipping missing values.
pub fn aggregate_numeric_field(rows: &RowSelection<'_>, field: &str) -> PolarsResult<FieldStats> {
    let values: Vec<f64> = rows
        .values(field)?
        .into_iter()
        .flatten()
        .filter(|value| value.is_finite())
        .collect();
    Ok(FieldStats::from_values(&values))
}

/// Value of `field` at the first selected row stamped at or after
/// `window_start`. A missing value on that row is not skipped over.
pub fn point_sample_at_start(
    rows: &RowSelection<'_>,
    field: &str,
    window_start: Option<NaiveDateTime>,
) -> PolarsResult<Option<f64>> {
    let Some(window_start) = window_start else {
        return Ok(None);
    };

    let start = to_micros(window_start);
    let idx = rows
        .timestamps()
        .partition_point(|&timestamp| timestamp < start);
    if idx >= rows.len() {
        return Ok(None);
    }

    Ok(rows.values(field)?.get(idx).filter(|value| value.is_finite()))
}
