//! Core data models for the usage classifier

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Input columns of the model, in the order both training and inference use.
pub const FEATURE_NAMES: [&str; 5] = [
    "Potenza_kW",
    "NIL",
    "RicaricheMedieGiornaliere",
    "DurataMediaMinuti",
    "EnergiaMediaKWh",
];

/// Neighborhood code used when a station has none recorded
pub const UNKNOWN_NEIGHBORHOOD: &str = "Sconosciuto";

/// Charging station as stored by the platform
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Station {
    pub station_id: i32,
    pub power_kw: f64,
    pub neighborhood: Option<String>,
}

/// A recorded charging event
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ChargeSession {
    pub session_id: i32,
    pub station_id: i32,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub energy_kwh: Option<f64>,
}

/// Per-station aggregates over the trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationStats {
    pub station_id: i32,
    pub power_kw: f64,
    pub neighborhood: String,
    pub session_count: u32,
    pub avg_duration_min: f64,
    pub avg_energy_kwh: f64,
    pub window_days: u32,
}

impl StationStats {
    /// Qualifying sessions per day over the window
    pub fn avg_daily_sessions(&self) -> f64 {
        if self.window_days == 0 {
            return 0.0;
        }
        self.session_count as f64 / self.window_days as f64
    }

    /// Model input row for this station
    pub fn features(&self) -> StationFeatures {
        StationFeatures {
            power_kw: self.power_kw,
            neighborhood: self.neighborhood.clone(),
            avg_daily_sessions: self.avg_daily_sessions(),
            avg_duration_min: self.avg_duration_min,
            avg_energy_kwh: self.avg_energy_kwh,
        }
    }
}

/// Model input row. Field order follows [`FEATURE_NAMES`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationFeatures {
    #[serde(rename = "Potenza_kW")]
    pub power_kw: f64,
    #[serde(rename = "NIL")]
    pub neighborhood: String,
    #[serde(rename = "RicaricheMedieGiornaliere")]
    pub avg_daily_sessions: f64,
    #[serde(rename = "DurataMediaMinuti")]
    pub avg_duration_min: f64,
    #[serde(rename = "EnergiaMediaKWh")]
    pub avg_energy_kwh: f64,
}

impl StationFeatures {
    /// Numeric columns in model order (the categorical column is handled separately)
    pub fn numeric(&self) -> [f64; 4] {
        [
            self.power_kw,
            self.avg_daily_sessions,
            self.avg_duration_min,
            self.avg_energy_kwh,
        ]
    }
}

/// Usage tier of a station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageLabel {
    Basso,
    Medio,
    Alto,
}

impl UsageLabel {
    pub const ALL: [UsageLabel; 3] = [UsageLabel::Basso, UsageLabel::Medio, UsageLabel::Alto];

    pub fn as_str(&self) -> &'static str {
        match self {
            UsageLabel::Basso => "basso",
            UsageLabel::Medio => "medio",
            UsageLabel::Alto => "alto",
        }
    }

    /// Class index used by the classifiers
    pub fn index(&self) -> usize {
        match self {
            UsageLabel::Basso => 0,
            UsageLabel::Medio => 1,
            UsageLabel::Alto => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for UsageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UsageLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basso" => Ok(UsageLabel::Basso),
            "medio" => Ok(UsageLabel::Medio),
            "alto" => Ok(UsageLabel::Alto),
            other => Err(format!("unknown usage label '{}'", other)),
        }
    }
}

/// Labeled training row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub station_id: i32,
    pub features: StationFeatures,
    pub label: UsageLabel,
}

/// Prediction endpoint response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_usage_level: UsageLabel,
}
