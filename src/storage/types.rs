use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

pub type Document = Map<String, Value>;

/// Append-only collections, one per prediction task plus raw sensor rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    DiseasePredictions,
    IrrigationPredictions,
    YieldPredictions,
    SensorReadings,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiseasePredictions => "disease_predictions",
            Self::IrrigationPredictions => "irrigation_predictions",
            Self::YieldPredictions => "yield_predictions",
            Self::SensorReadings => "sensor_readings",
        }
    }

    /// Maps a task name as used in URLs (`disease`, `irrigation`, `yield`) to
    /// its prediction collection.
    pub fn for_task(task: &str) -> Result<Self> {
        match task.trim().to_lowercase().as_str() {
            "disease" => Ok(Self::DiseasePredictions),
            "irrigation" => Ok(Self::IrrigationPredictions),
            "yield" => Ok(Self::YieldPredictions),
            other => Err(Error::UnknownCollection(other.to_string())),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "disease_predictions" => Ok(Self::DiseasePredictions),
            "irrigation_predictions" => Ok(Self::IrrigationPredictions),
            "yield_predictions" => Ok(Self::YieldPredictions),
            "sensor_readings" => Ok(Self::SensorReadings),
            other => Err(Error::UnknownCollection(other.to_string())),
        }
    }
}

/// What a prediction route writes: the raw client input next to the model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub input_features: Value,
    pub result: Value,
}

impl PredictionRecord {
    pub fn new(input_features: impl Serialize, result: impl Serialize) -> Result<Self> {
        Ok(Self {
            input_features: serde_json::to_value(input_features)?,
            result: serde_json::to_value(result)?,
        })
    }

    pub fn into_document(self) -> Document {
        Map::from_iter([
            ("input_features".to_string(), self.input_features),
            ("result".to_string(), self.result),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub document: Document,
}
