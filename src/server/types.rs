use crate::{
    inference::{DiseasePrediction, IrrigationPrediction, YieldPrediction},
    models::ModelStatus,
    storage::StoredDocument,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub available_routes: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub models: ModelStatus,
    pub persistent_storage: bool,
    pub remote_recommendations: bool,
}

#[derive(Debug, Serialize)]
pub struct DiseaseResponse {
    #[serde(flatten)]
    pub prediction: DiseasePrediction,
    pub db_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IrrigationResponse {
    #[serde(flatten)]
    pub prediction: IrrigationPrediction,
    pub db_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct YieldResponse {
    #[serde(flatten)]
    pub prediction: YieldPrediction,
    pub db_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub task_type: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub prediction: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub recommendation: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictionsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PredictionsResponse {
    pub collection: String,
    pub count: usize,
    pub records: Vec<StoredDocument>,
}

/// One row from a field sensor, keyed the way the loggers send it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default)]
    pub timestamp: Option<String>,
    pub sensor_id: String,
    #[serde(rename = "temp_C", alias = "temp_c")]
    pub temp_c: f64,
    pub humidity_pct: f64,
    pub soil_moisture_pct: f64,
    #[serde(rename = "pH", alias = "ph")]
    pub ph: f64,
}

#[derive(Debug, Serialize)]
pub struct SensorResponse {
    pub inserted_id: String,
}
