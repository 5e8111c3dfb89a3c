//! Turns normalized input into model output shaped for the API.
//! Nothing here persists; callers own storage.

mod disease;

pub use disease::{DiseasePrediction, classify, predict_disease, preprocess, softmax};

use crate::{
    Error, Result,
    constants::{YIELD_UNIT, irrigation_recommendation},
    features::{self, FeatureSchema},
    models::Regressor,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationPrediction {
    pub predicted_moisture: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldPrediction {
    pub predicted_yield: f64,
    pub unit: String,
}

pub fn predict_irrigation(model: &dyn Regressor, raw: &Map<String, Value>) -> Result<IrrigationPrediction> {
    let predicted_moisture = regress(model, raw, &features::IRRIGATION)?;
    Ok(IrrigationPrediction {
        predicted_moisture,
        recommendation: irrigation_recommendation(predicted_moisture).to_string(),
    })
}

pub fn predict_yield(model: &dyn Regressor, raw: &Map<String, Value>) -> Result<YieldPrediction> {
    let predicted_yield = regress(model, raw, &features::YIELD)?;
    Ok(YieldPrediction {
        predicted_yield,
        unit: YIELD_UNIT.to_string(),
    })
}

fn regress(model: &dyn Regressor, raw: &Map<String, Value>, schema: &FeatureSchema) -> Result<f64> {
    let row = features::normalize(raw, schema);
    debug!(
        "Normalized {} input: derived={:?} defaulted={:?}",
        schema.name,
        row.derived(),
        row.defaulted()
    );

    let value = model.predict(&row)?;
    if !value.is_finite() {
        return Err(Error::inference(format!(
            "{} model returned a non-finite value",
            schema.name
        )));
    }
    Ok(value)
}
