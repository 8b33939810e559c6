use std::fmt;

use serde::Serialize;

use crate::coerce::parse_numeric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValveStatus {
    Open,
    Closed,
    Partial,
    Unknown,
}

impl ValveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValveStatus::Open => "Open",
            ValveStatus::Closed => "Closed",
            ValveStatus::Partial => "Partial",
            ValveStatus::Unknown => "Unknown",
        }
    }

    pub fn from_position(position: Option<f64>) -> Self {
        match position {
            Some(value) if value.is_nan() => ValveStatus::Unknown,
            Some(value) if value == 0.0 => ValveStatus::Closed,
            Some(value) if value == 1.0 => ValveStatus::Open,
            Some(_) => ValveStatus::Partial,
            None => ValveStatus::Unknown,
        }
    }

    pub fn from_raw(raw: Option<&str>) -> Self {
        Self::from_position(raw.and_then(|value| parse_numeric(value).ok()))
    }
}

impl fmt::Display for ValveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
