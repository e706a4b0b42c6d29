use crate::error::{AppError, Result};
use crate::ml::models::{Label, TrainingSummary};
use crate::models::FlightRecord;
use chrono::{Datelike, NaiveDateTime, Timelike};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Number of columns the classifier consumes
pub const N_FEATURES: usize = 10;

/// Timestamp layout used by the `Fecha-I` / `Fecha-O` columns
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A flight counts as delayed when it left strictly more than this many minutes late
pub const DELAY_THRESHOLD_MINUTES: f64 = 15.0;

/// The fixed set of one-hot columns the classifier was selected on.
///
/// Declaration order is the positional order of the feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    OperaLatinAmericanWings,
    Month7,
    Month10,
    OperaGrupoLatam,
    Month12,
    FlightTypeInternational,
    Month4,
    Month11,
    OperaSkyAirline,
    OperaCopaAir,
}

impl FeatureColumn {
    /// All columns in vector order
    pub const ALL: [FeatureColumn; N_FEATURES] = [
        FeatureColumn::OperaLatinAmericanWings,
        FeatureColumn::Month7,
        FeatureColumn::Month10,
        FeatureColumn::OperaGrupoLatam,
        FeatureColumn::Month12,
        FeatureColumn::FlightTypeInternational,
        FeatureColumn::Month4,
        FeatureColumn::Month11,
        FeatureColumn::OperaSkyAirline,
        FeatureColumn::OperaCopaAir,
    ];

    /// One-hot column name, `{field}_{value}`
    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::OperaLatinAmericanWings => "OPERA_Latin American Wings",
            FeatureColumn::Month7 => "MES_7",
            FeatureColumn::Month10 => "MES_10",
            FeatureColumn::OperaGrupoLatam => "OPERA_Grupo LATAM",
            FeatureColumn::Month12 => "MES_12",
            FeatureColumn::FlightTypeInternational => "TIPOVUELO_I",
            FeatureColumn::Month4 => "MES_4",
            FeatureColumn::Month11 => "MES_11",
            FeatureColumn::OperaSkyAirline => "OPERA_Sky Airline",
            FeatureColumn::OperaCopaAir => "OPERA_Copa Air",
        }
    }

    /// Position in the feature vector
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Look up a whitelisted column by its one-hot name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|column| column.name() == name)
    }
}

/// Column names in vector order
pub fn feature_names() -> Vec<&'static str> {
    FeatureColumn::ALL.iter().map(|c| c.name()).collect()
}

/// One row of classifier input
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector([f64; N_FEATURES]);

impl FeatureVector {
    pub fn zeros() -> Self {
        Self([0.0; N_FEATURES])
    }

    pub fn get(&self, column: FeatureColumn) -> f64 {
        self.0[column.index()]
    }

    pub fn set(&mut self, column: FeatureColumn, value: f64) {
        self.0[column.index()] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Named view of the row, in column order
    pub fn named(&self) -> Vec<(&'static str, f64)> {
        FeatureColumn::ALL
            .iter()
            .map(|column| (column.name(), self.get(*column)))
            .collect()
    }
}

/// Encoded rows, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureVector>,
}

impl FeatureTable {
    pub fn from_rows(rows: Vec<FeatureVector>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        feature_names()
    }

    /// All values of one column
    pub fn column(&self, column: FeatureColumn) -> Vec<f64> {
        self.rows.iter().map(|row| row.get(column)).collect()
    }

    /// Dense `n_rows × N_FEATURES` matrix
    pub fn to_array(&self) -> Array2<f64> {
        let mut array = Array2::zeros((self.rows.len(), N_FEATURES));
        for (i, row) in self.rows.iter().enumerate() {
            for (j, &value) in row.as_slice().iter().enumerate() {
                array[[i, j]] = value;
            }
        }
        array
    }
}

/// Part of the day a flight was scheduled in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodOfDay {
    Morning,
    Afternoon,
    Night,
}

impl fmt::Display for PeriodOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodOfDay::Morning => write!(f, "morning"),
            PeriodOfDay::Afternoon => write!(f, "afternoon"),
            PeriodOfDay::Night => write!(f, "night"),
        }
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| AppError::Parse(format!("invalid timestamp '{}': {}", value, e)))
}

/// 05:00-11:59 morning, 12:00-18:59 afternoon, anything else night.
///
/// Band ends are exact minutes, so `11:59:30` is already night.
pub fn period_of_day(at: &NaiveDateTime) -> PeriodOfDay {
    let clock = (at.num_seconds_from_midnight(), at.nanosecond());
    let in_band = |start: (u32, u32), end: (u32, u32)| {
        clock >= (start.0 * 3600 + start.1 * 60, 0) && clock <= (end.0 * 3600 + end.1 * 60, 0)
    };

    if in_band((5, 0), (11, 59)) {
        PeriodOfDay::Morning
    } else if in_band((12, 0), (18, 59)) {
        PeriodOfDay::Afternoon
    } else {
        PeriodOfDay::Night
    }
}

/// High-season windows as `((month, day), (month, day))`, both ends inclusive
const HIGH_SEASON_WINDOWS: [((u32, u32), (u32, u32)); 4] = [
    ((12, 15), (12, 31)),
    ((1, 1), (3, 3)),
    ((7, 15), (7, 31)),
    ((9, 11), (9, 30)),
];

/// Dec 15-31, Jan 1-Mar 3, Jul 15-31 and Sep 11-30 of the date's own year.
///
/// Each window closes at midnight on its last day: `12-31 00:00:00` is high
/// season, `12-31 10:00:00` is not.
pub fn is_high_season(at: &NaiveDateTime) -> bool {
    let day = (at.month(), at.day());
    let at_midnight = at.num_seconds_from_midnight() == 0 && at.nanosecond() == 0;

    HIGH_SEASON_WINDOWS
        .iter()
        .any(|&(start, end)| start <= day && (day < end || (day == end && at_midnight)))
}

/// Minutes between scheduled and actual departure; negative when early
pub fn minutes_late(scheduled: &NaiveDateTime, actual: &NaiveDateTime) -> f64 {
    (*actual - *scheduled).num_seconds() as f64 / 60.0
}

pub fn delay_label(minutes_late: f64) -> Label {
    if minutes_late > DELAY_THRESHOLD_MINUTES {
        1
    } else {
        0
    }
}

/// Date-derived attributes of a training row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedFeatures {
    pub period_of_day: PeriodOfDay,
    pub high_season: u8,
    pub minutes_late: Option<f64>,
}

/// Output of the training-path encoder
#[derive(Debug, Clone)]
pub struct EncodedTrainingData {
    pub features: FeatureTable,
    pub labels: Vec<Label>,
    pub derived: Vec<DerivedFeatures>,
}

impl EncodedTrainingData {
    /// Delay rates broken down by the date-derived attributes
    pub fn summary(&self) -> TrainingSummary {
        let n_samples = self.labels.len();
        if n_samples == 0 {
            return TrainingSummary::default();
        }

        let rate = |pairs: Vec<Label>| -> f64 {
            if pairs.is_empty() {
                0.0
            } else {
                pairs.iter().map(|&l| l as f64).sum::<f64>() / pairs.len() as f64
            }
        };

        let mut by_period: HashMap<PeriodOfDay, Vec<Label>> = HashMap::new();
        let mut high = Vec::new();
        let mut low = Vec::new();

        for (derived, &label) in self.derived.iter().zip(self.labels.iter()) {
            by_period.entry(derived.period_of_day).or_default().push(label);
            if derived.high_season == 1 {
                high.push(label);
            } else {
                low.push(label);
            }
        }

        TrainingSummary {
            n_samples,
            delay_rate: rate(self.labels.clone()),
            delay_rate_by_period: by_period
                .into_iter()
                .map(|(period, labels)| (period, rate(labels)))
                .collect(),
            high_season_delay_rate: rate(high),
            low_season_delay_rate: rate(low),
        }
    }
}

/// Maps flight records onto the fixed feature whitelist
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn new() -> Self {
        Self
    }

    /// One-hot indicator names generated for a record
    pub fn indicator_names(record: &FlightRecord) -> [String; 3] {
        [
            format!("OPERA_{}", record.operator),
            format!("MES_{}", record.month),
            format!("TIPOVUELO_{}", record.flight_type.code()),
        ]
    }

    /// Encode one record; indicators outside the whitelist are dropped
    pub fn encode_record(&self, record: &FlightRecord) -> FeatureVector {
        let mut vector = FeatureVector::zeros();
        for name in Self::indicator_names(record) {
            if let Some(column) = FeatureColumn::from_name(&name) {
                vector.set(column, 1.0);
            }
        }
        vector
    }

    /// Encode records for inference, preserving order
    pub fn encode(&self, records: &[FlightRecord]) -> FeatureTable {
        FeatureTable::from_rows(records.iter().map(|r| self.encode_record(r)).collect())
    }

    /// Compute the date-derived attributes of a record.
    ///
    /// Requires the scheduled timestamp. The actual timestamp is only read
    /// when the record carries no delay label.
    pub fn derive(&self, record: &FlightRecord) -> Result<DerivedFeatures> {
        let scheduled = record
            .scheduled_at
            .as_deref()
            .ok_or_else(|| AppError::Parse("missing scheduled timestamp (Fecha-I)".to_string()))
            .and_then(parse_timestamp)?;

        let minutes_late = match (record.delay, record.actual_at.as_deref()) {
            (None, Some(actual)) => Some(minutes_late(&scheduled, &parse_timestamp(actual)?)),
            _ => None,
        };

        Ok(DerivedFeatures {
            period_of_day: period_of_day(&scheduled),
            high_season: is_high_season(&scheduled) as u8,
            minutes_late,
        })
    }

    /// Encode records for training, deriving labels where the record has none
    pub fn encode_training(&self, records: &[FlightRecord]) -> Result<EncodedTrainingData> {
        let mut labels = Vec::with_capacity(records.len());
        let mut derived = Vec::with_capacity(records.len());

        for (row, record) in records.iter().enumerate() {
            let features = self.derive(record).map_err(|e| match e {
                AppError::Parse(message) => AppError::Parse(format!("row {}: {}", row, message)),
                other => other,
            })?;

            let label = match (record.delay, features.minutes_late) {
                (Some(label), _) => label,
                (None, Some(minutes)) => delay_label(minutes),
                (None, None) => {
                    return Err(AppError::Parse(format!(
                        "row {}: missing actual timestamp (Fecha-O) needed for the delay label",
                        row
                    )))
                }
            };

            labels.push(label);
            derived.push(features);
        }

        Ok(EncodedTrainingData {
            features: self.encode(records),
            labels,
            derived,
        })
    }
}
