use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Column layout of the inputs and the event list, loaded from TOML.
///
/// Every field has a default matching the plant exports, so an empty file
/// (or no file at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Ordered event names; output columns follow this order.
    pub event_names: Vec<String>,
    /// Batches that must appear in the output even without an event row.
    pub expected_batches: Vec<String>,
    /// Fan batches out on the rayon pool. Output order is unchanged.
    pub parallel: bool,
    pub process: ProcessSchema,
    pub telemetry: TelemetrySchema,
    pub events: EventSchema,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            event_names: vec!["E1".into(), "E2".into(), "E3".into()],
            expected_batches: Vec::new(),
            parallel: false,
            process: ProcessSchema::default(),
            telemetry: TelemetrySchema::default(),
            events: EventSchema::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessSchema {
    pub time_column: String,
    pub parameters: Vec<ParameterColumn>,
}

impl Default for ProcessSchema {
    fn default() -> Self {
        Self {
            time_column: "Time".into(),
            parameters: (1..=3)
                .map(|n| ParameterColumn {
                    column: format!("Parameter{n}"),
                    label: format!("Para{n}"),
                })
                .collect(),
        }
    }
}

impl ProcessSchema {
    pub fn columns(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.column.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterColumn {
    /// Source column name.
    pub column: String,
    /// Suffix used in output columns (`E1_Avg<label>`).
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySchema {
    pub time_column: String,
    pub valve_column: String,
    pub pump_column: String,
}

impl Default for TelemetrySchema {
    fn default() -> Self {
        Self {
            time_column: "Time".into(),
            valve_column: "valve_position".into(),
            pump_column: "pump_speed".into(),
        }
    }
}

impl TelemetrySchema {
    pub fn columns(&self) -> Vec<&str> {
        vec![self.valve_column.as_str(), self.pump_column.as_str()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventSchema {
    pub batch_id_column: String,
    pub start_suffix: String,
    pub end_suffix: String,
}

impl Default for EventSchema {
    fn default() -> Self {
        Self {
            batch_id_column: "Batch_ID".into(),
            start_suffix: "_start".into(),
            end_suffix: "_end".into(),
        }
    }
}

impl EventSchema {
    pub fn start_column(&self, event: &str) -> String {
        format!("{event}{}", self.start_suffix)
    }

    pub fn end_column(&self, event: &str) -> String {
        format!("{event}{}", self.end_suffix)
    }
}

impl PipelineConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn parameter_labels(&self) -> Vec<&str> {
        self.process
            .parameters
            .iter()
            .map(|p| p.label.as_str())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_names.is_empty() {
            return Err(PipelineError::Config(
                "event_names must list at least one event".into(),
            ));
        }
        ensure_unique("event name", self.event_names.iter().map(String::as_str))?;
        ensure_unique("parameter label", self.parameter_labels())?;
        ensure_unique("parameter column", self.process.columns())?;
        ensure_unique(
            "expected batch",
            self.expected_batches.iter().map(String::as_str),
        )?;
        ensure_unique("telemetry column", self.telemetry.columns())?;

        for (what, value) in [
            ("process.time_column", &self.process.time_column),
            ("telemetry.time_column", &self.telemetry.time_column),
            ("events.batch_id_column", &self.events.batch_id_column),
            ("events.start_suffix", &self.events.start_suffix),
            ("events.end_suffix", &self.events.end_suffix),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::Config(format!("{what} cannot be empty")));
            }
        }

        if self.events.start_suffix == self.events.end_suffix {
            return Err(PipelineError::Config(
                "events.start_suffix and events.end_suffix must differ".into(),
            ));
        }

        Ok(())
    }
}

fn ensure_unique<'a>(what: &str, values: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for value in values {
        if value.trim().is_empty() {
            return Err(PipelineError::Config(format!("{what} cannot be empty")));
        }
        if !seen.insert(value) {
            return Err(PipelineError::Config(format!("duplicate {what} '{value}'")));
        }
    }
    Ok(())
}
