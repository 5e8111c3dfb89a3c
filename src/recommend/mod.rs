//! Farmer-facing advice for a prediction. A configured chat backend gets one
//! bounded attempt; anything short of a non-empty answer falls back to fixed
//! rule-based text.

use crate::{
    Error, Result,
    config::LlmConfig,
    constants::{rainfall_band, temperature_band, yield_band},
    llm::{ChatCompletionRequest, ChatMessage, LlmClient, OpenAiClient},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You are an expert agricultural consultant. Analyze the data you are given and provide a concise, actionable recommendation for the farmer.";
const GENERIC_ADVICE: &str = "Please consult an expert for detailed advice.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskType {
    DiseaseDetection,
    IrrigationPrediction,
    YieldPrediction,
    Other(String),
}

impl From<&str> for TaskType {
    fn from(value: &str) -> Self {
        match value {
            "Disease Detection" => Self::DiseaseDetection,
            "Irrigation Prediction" => Self::IrrigationPrediction,
            "Yield Prediction" => Self::YieldPrediction,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiseaseDetection => f.write_str("Disease Detection"),
            Self::IrrigationPrediction => f.write_str("Irrigation Prediction"),
            Self::YieldPrediction => f.write_str("Yield Prediction"),
            Self::Other(name) if name.trim().is_empty() => f.write_str("General Agriculture"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "text", rename_all = "snake_case")]
pub enum Recommendation {
    Generated(String),
    Fallback(String),
}

impl Recommendation {
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) | Self::Fallback(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Generated(text) | Self::Fallback(text) => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

pub struct Recommender {
    client: Option<Arc<dyn LlmClient>>,
    model: String,
    timeout: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl Recommender {
    /// Rule-based only; no remote backend is ever called.
    pub fn disabled() -> Self {
        let defaults = LlmConfig::default();
        Self {
            client: None,
            model: defaults.model,
            timeout: Duration::from_secs(defaults.timeout_secs),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    pub fn from_config(config: Option<&LlmConfig>) -> Self {
        match config {
            Some(config) if config.is_configured() => {
                info!("Recommendation backend enabled with model {}", config.model);
                Self::with_client(Arc::new(OpenAiClient::new(config.clone())), config)
            }
            _ => {
                info!("No recommendation backend configured, using rule-based advice");
                Self::disabled()
            }
        }
    }

    pub fn with_client(client: Arc<dyn LlmClient>, config: &LlmConfig) -> Self {
        Self {
            client: Some(client),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub async fn recommend(
        &self,
        task_type: &str,
        inputs: &Map<String, Value>,
        prediction: &Map<String, Value>,
    ) -> Recommendation {
        let task = TaskType::from(task_type);
        let Some(client) = &self.client else {
            return Recommendation::Fallback(fallback(&task, prediction));
        };

        match self.generate(client.as_ref(), &task, inputs, prediction).await {
            Ok(text) => {
                debug!("Generated recommendation for {}", task);
                Recommendation::Generated(text)
            }
            Err(e) => {
                warn!("Recommendation backend failed, using fallback: {}", e);
                Recommendation::Fallback(fallback(&task, prediction))
            }
        }
    }

    async fn generate(
        &self,
        client: &dyn LlmClient,
        task: &TaskType,
        inputs: &Map<String, Value>,
        prediction: &Map<String, Value>,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_prompt(task, inputs, prediction)),
            ],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };

        let response = tokio::time::timeout(self.timeout, client.create_chat_completion(request))
            .await
            .map_err(|_| {
                Error::llm(format!(
                    "no response within {} ms",
                    self.timeout.as_millis()
                ))
            })??;

        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| Error::llm("backend returned an empty recommendation"))
    }
}

pub fn build_prompt(
    task: &TaskType,
    inputs: &Map<String, Value>,
    prediction: &Map<String, Value>,
) -> String {
    let mut prompt = format!(
        "Task: {task}\n\nInput Conditions:\n{}\n\nModel Prediction:\n{}\n",
        to_pretty(inputs),
        to_pretty(prediction)
    );

    let mut context = Vec::new();
    if *task == TaskType::YieldPrediction {
        if let Some(predicted) = prediction.get("predicted_yield").and_then(Value::as_f64) {
            context.push(format!("Yield outlook: {}", yield_band(predicted)));
        }
    }
    if let Some(rainfall) = inputs.get("rainfall").and_then(Value::as_f64) {
        context.push(format!("Rainfall: {}", rainfall_band(rainfall)));
    }
    if let Some(temperature) = inputs.get("temperature").and_then(Value::as_f64) {
        context.push(format!("Temperature: {}", temperature_band(temperature)));
    }
    if !context.is_empty() {
        prompt.push_str("\nContext:\n");
        for line in context {
            prompt.push_str("- ");
            prompt.push_str(&line);
            prompt.push('\n');
        }
    }

    prompt.push_str(
        "\nPlease provide:\n\
         1. A brief analysis of the situation.\n\
         2. Specific steps the farmer should take.\n\
         3. Any precautions.\n\n\
         Keep the tone professional yet encouraging.",
    );
    prompt
}

/// Deterministic advice keyed by task type.
pub fn fallback(task: &TaskType, prediction: &Map<String, Value>) -> String {
    match task {
        TaskType::DiseaseDetection => {
            let disease = text_field(prediction, "predicted_class", "Unknown");
            format!(
                "**Detected Disease:** {disease}.\n\n**Recommendation:** Consult a local plant pathologist for specific chemical or organic treatments suitable for {disease}. Isolate the affected plants to prevent spread."
            )
        }
        TaskType::IrrigationPrediction => {
            let status = text_field(prediction, "recommendation", "Monitor");
            format!(
                "**Status:** {status}.\n\n**Recommendation:** Based on the soil moisture levels, follow the model's advice. Ensure your irrigation system is functioning correctly and check soil moisture manually if in doubt."
            )
        }
        TaskType::YieldPrediction => {
            let predicted = prediction
                .get("predicted_yield")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            format!(
                "**Forecast:** {predicted:.2} tons.\n\n**Recommendation:** To maximize this yield, ensure optimal fertilization and pest control. Monitor weather conditions closely as harvest approaches."
            )
        }
        TaskType::Other(_) => GENERIC_ADVICE.to_string(),
    }
}

fn text_field(map: &Map<String, Value>, key: &str, default: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

fn to_pretty(map: &Map<String, Value>) -> String {
    serde_json::to_string_pretty(map).unwrap_or_else(|_| format!("{map:?}"))
}
