use super::types::*;
use crate::{
    Error,
    features::{IrrigationInput, YieldInput},
    inference::{self, DiseasePrediction},
    models::ModelRegistry,
    recommend::Recommender,
    storage::{Collection, PredictionRecord, PredictionStore},
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const MAX_HISTORY_LIMIT: usize = 100;

const ACCEPTED_IMAGE_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

#[derive(Clone)]
pub struct AppState {
    pub models: Arc<ModelRegistry>,
    pub store: Arc<PredictionStore>,
    pub recommender: Arc<Recommender>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: Error) -> ApiError {
    let status = match &e {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        Error::UnknownCollection(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    match &e {
        Error::ModelNotFound { .. } => error!("Model artifact missing: {}", e),
        _ if status.is_server_error() => error!("Request failed: {}", e),
        _ => warn!("Rejected request: {}", e),
    }

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// Best-effort write of one prediction; the caller still answers on failure.
async fn persist(
    store: &PredictionStore,
    collection: Collection,
    input: impl Serialize,
    result: impl Serialize,
) -> Option<String> {
    let document = match PredictionRecord::new(input, result) {
        Ok(record) => record.into_document(),
        Err(e) => {
            error!("Failed to build {} record: {}", collection, e);
            return None;
        }
    };

    match store.insert(collection, document).await {
        Ok(id) => Some(id),
        Err(e) => {
            error!("Failed to persist prediction to {}: {}", collection, e);
            None
        }
    }
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Smart Agriculture AI Backend is running!".to_string(),
        available_routes: vec![
            "/predict/disease",
            "/predict/irrigation",
            "/predict/yield",
            "/ai/recommend",
            "/predictions/{task}",
            "/sensor",
            "/health",
        ],
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        models: state.models.status(),
        persistent_storage: state.store.is_persistent(),
        remote_recommendations: state.recommender.is_enabled(),
    })
}

pub async fn predict_disease(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DiseaseResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Malformed multipart upload: {}", e);
        (
            e.status(),
            Json(ErrorResponse {
                error: e.body_text(),
            }),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !ACCEPTED_IMAGE_TYPES.contains(&content_type.as_str()) {
            return Err(api_error(Error::UnsupportedMediaType(
                "Invalid image format. Upload JPG or PNG.".to_string(),
            )));
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            (
                e.status(),
                Json(ErrorResponse {
                    error: e.body_text(),
                }),
            )
        })?;
        upload = Some((filename, content_type, bytes));
        break;
    }

    let (filename, content_type, bytes) = upload
        .ok_or_else(|| api_error(Error::invalid_input("Missing multipart field 'file'")))?;
    info!(
        "Received disease prediction request: {} ({} bytes)",
        filename,
        bytes.len()
    );

    let model = state.models.disease().await.map_err(api_error)?;
    let prediction: DiseasePrediction = inference::predict_disease(model, bytes.to_vec())
        .await
        .map_err(api_error)?;

    let input = json!({
        "filename": filename,
        "content_type": content_type,
        "size_bytes": bytes.len(),
    });
    let db_id = persist(
        &state.store,
        Collection::DiseasePredictions,
        input,
        &prediction,
    )
    .await;

    Ok(Json(DiseaseResponse { prediction, db_id }))
}

pub async fn predict_irrigation(
    State(state): State<AppState>,
    Json(input): Json<IrrigationInput>,
) -> Result<Json<IrrigationResponse>, ApiError> {
    info!("Received irrigation prediction request");

    let raw = input.to_raw().map_err(api_error)?;
    let model = state.models.irrigation().await.map_err(api_error)?;
    let prediction = inference::predict_irrigation(model.as_ref(), &raw).map_err(api_error)?;

    let db_id = persist(
        &state.store,
        Collection::IrrigationPredictions,
        &raw,
        &prediction,
    )
    .await;

    Ok(Json(IrrigationResponse { prediction, db_id }))
}

pub async fn predict_yield(
    State(state): State<AppState>,
    Json(input): Json<YieldInput>,
) -> Result<Json<YieldResponse>, ApiError> {
    info!("Received yield prediction request");

    let raw = input.to_raw().map_err(api_error)?;
    let model = state.models.yield_model().await.map_err(api_error)?;
    let prediction = inference::predict_yield(model.as_ref(), &raw).map_err(api_error)?;

    let db_id = persist(&state.store, Collection::YieldPredictions, &raw, &prediction).await;

    Ok(Json(YieldResponse { prediction, db_id }))
}

pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> Json<RecommendResponse> {
    info!("Received recommendation request for {}", request.task_type);

    let recommendation = state
        .recommender
        .recommend(&request.task_type, &request.inputs, &request.prediction)
        .await;

    Json(RecommendResponse {
        recommendation: recommendation.into_text(),
    })
}

pub async fn recent_predictions(
    State(state): State<AppState>,
    Path(task): Path<String>,
    Query(query): Query<PredictionsQuery>,
) -> Result<Json<PredictionsResponse>, ApiError> {
    let collection = Collection::for_task(&task).map_err(api_error)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    let records = state
        .store
        .query_recent(collection, limit)
        .await
        .map_err(api_error)?;

    Ok(Json(PredictionsResponse {
        collection: collection.to_string(),
        count: records.len(),
        records,
    }))
}

pub async fn ingest_sensor(
    State(state): State<AppState>,
    Json(mut reading): Json<SensorReading>,
) -> Result<Json<SensorResponse>, ApiError> {
    if reading.timestamp.as_deref().is_none_or(|t| t.trim().is_empty()) {
        reading.timestamp = Some(Utc::now().to_rfc3339());
    }

    let document = match serde_json::to_value(&reading).map_err(|e| api_error(e.into()))? {
        Value::Object(map) => map,
        _ => return Err(api_error(Error::internal("sensor reading is not an object"))),
    };

    let inserted_id = state
        .store
        .insert(Collection::SensorReadings, document)
        .await
        .map_err(api_error)?;
    info!("Stored reading from sensor {}", reading.sensor_id);

    Ok(Json(SensorResponse { inserted_id }))
}
