use crate::Result;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

/// Irrigation request body. Accepts both the form field names and the
/// sensor-dataset column names; anything else is kept in `extra` and still
/// offered to the normalizer. Values stay untyped so numeric strings reach
/// the normalizer's coercion instead of failing here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrrigationInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rainfall: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ec: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_moisture: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_moisture: Option<Value>,

    #[serde(rename = "Time", default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Value>,
    #[serde(
        rename = "Atmospheric_Temp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub atmospheric_temp: Option<Value>,
    #[serde(rename = "Soil_Temp", default, skip_serializing_if = "Option::is_none")]
    pub soil_temp: Option<Value>,
    #[serde(
        rename = "Soil_Moisture",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub soil_moisture_reading: Option<Value>,
    #[serde(rename = "Dew_Point", default, skip_serializing_if = "Option::is_none")]
    pub dew_point: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Yield request body. Categorical fields may arrive as names or codes;
/// numeric fields accept numbers or numeric strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldInput {
    #[serde(default)]
    pub crop: Option<Value>,
    #[serde(deserialize_with = "lenient_f64")]
    pub area: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub rainfall: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub temperature: f64,
    #[serde(default)]
    pub season: Option<Value>,
    #[serde(default)]
    pub soil_type: Option<Value>,
    #[serde(deserialize_with = "lenient_f64")]
    pub ph: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub fertilizer_level: f64,
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom(format!("number out of range: {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("expected a number, got {s:?}"))),
        other => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}

impl IrrigationInput {
    pub fn to_raw(&self) -> Result<Map<String, Value>> {
        to_object(self)
    }
}

impl YieldInput {
    pub fn to_raw(&self) -> Result<Map<String, Value>> {
        to_object(self)
    }
}

fn to_object<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Ok(Map::from_iter([("value".to_string(), other)])),
    }
}
