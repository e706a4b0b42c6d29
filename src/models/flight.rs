use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ml::models::Label;

/// Airline operators the model knows about
pub const OPERATORS: [&str; 23] = [
    "Aerolineas Argentinas",
    "Aeromexico",
    "Air Canada",
    "Air France",
    "Alitalia",
    "American Airlines",
    "Austral",
    "Avianca",
    "British Airways",
    "Copa Air",
    "Delta Air",
    "Gol Trans",
    "Grupo LATAM",
    "Iberia",
    "JetSmart SPA",
    "K.L.M.",
    "Lacsa",
    "Latin American Wings",
    "Oceanair Linhas Aereas",
    "Plus Ultra Lineas Aereas",
    "Qantas Airways",
    "Sky Airline",
    "United Airlines",
];

/// Check an operator name against the allow-list
pub fn is_known_operator(name: &str) -> bool {
    OPERATORS.contains(&name)
}

/// Check a month number is a calendar month
pub fn is_valid_month(month: i64) -> bool {
    (1..=12).contains(&month)
}

/// Flight type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightType {
    /// Domestic flight
    #[serde(rename = "N")]
    National,
    /// International flight
    #[serde(rename = "I")]
    International,
}

impl FlightType {
    /// Wire code used by the dataset and the HTTP API
    pub fn code(&self) -> &'static str {
        match self {
            FlightType::National => "N",
            FlightType::International => "I",
        }
    }
}

impl fmt::Display for FlightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FlightType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(FlightType::National),
            "I" => Ok(FlightType::International),
            other => Err(format!("unknown flight type '{}'", other)),
        }
    }
}

/// A raw flight as it appears in the training dataset or a prediction request.
///
/// Scheduled and actual timestamps are kept as the raw `YYYY-MM-DD HH:MM:SS`
/// strings; they are only parsed when training features are derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    /// Airline operator name
    #[serde(rename = "OPERA")]
    pub operator: String,

    /// National or international flight
    #[serde(rename = "TIPOVUELO")]
    pub flight_type: FlightType,

    /// Month of operation (1-12)
    #[serde(rename = "MES")]
    pub month: u32,

    /// Scheduled departure
    #[serde(rename = "Fecha-I", default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,

    /// Actual departure
    #[serde(rename = "Fecha-O", default, skip_serializing_if = "Option::is_none")]
    pub actual_at: Option<String>,

    /// Pre-computed delay label, when the dataset already carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Label>,
}

impl FlightRecord {
    /// Create a record with only the categorical attributes used for inference
    pub fn new(operator: impl Into<String>, flight_type: FlightType, month: u32) -> Self {
        Self {
            operator: operator.into(),
            flight_type,
            month,
            scheduled_at: None,
            actual_at: None,
            delay: None,
        }
    }

    /// Attach scheduled and actual departure timestamps
    pub fn with_times(mut self, scheduled_at: impl Into<String>, actual_at: impl Into<String>) -> Self {
        self.scheduled_at = Some(scheduled_at.into());
        self.actual_at = Some(actual_at.into());
        self
    }

    /// Attach a known delay label
    pub fn with_delay(mut self, delay: Label) -> Self {
        self.delay = Some(delay);
        self
    }
}
