use agri_serve::{
    config::LlmConfig,
    recommend::Recommender,
    server::{AppState, router},
    storage::Collection,
};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{mocks::*, test_utils::*};
use image::ImageFormat;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

mod common;

const BOUNDARY: &str = "agri-test-boundary";

async fn create_test_app() -> (Router, AppState, TempDir) {
    let (app, state, temp_dir, _classifier) = create_disease_app().await;
    (app, state, temp_dir)
}

/// Same app, keeping a handle on the classifier to count forward passes.
async fn create_disease_app() -> (Router, AppState, TempDir, Arc<FixedClassifier>) {
    let temp_dir = create_temp_dir();
    let models = create_test_models(&temp_dir).await;
    let classifier = FixedClassifier::new([0.2, 3.5, 0.1]);
    let state = create_test_state(
        models,
        Some(disease_model_with(classifier.clone())),
        Recommender::disabled(),
    )
    .await;
    let app = router(state.clone(), 1024 * 1024);
    (app, state, temp_dir, classifier)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_image(uri: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(BOUNDARY, "leaf.png", content_type, data)))
        .unwrap()
}

fn yield_body(area: f64) -> Value {
    json!({
        "crop": "rice",
        "area": area,
        "rainfall": 120.0,
        "temperature": 28.0,
        "season": "kharif",
        "soil_type": "loamy",
        "ph": 6.5,
        "fertilizer_level": 2
    })
}

#[tokio::test]
async fn test_root_lists_routes() {
    let (app, _state, _temp_dir) = create_test_app().await;

    let (status, body) = send(&app, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Smart Agriculture AI Backend is running!");
    let routes = body["available_routes"].as_array().unwrap();
    assert!(routes.contains(&json!("/predict/disease")));
    assert!(routes.contains(&json!("/predict/yield")));
}

#[tokio::test]
async fn test_health_reports_model_status() {
    let (app, _state, _temp_dir) = create_test_app().await;

    let (status, body) = send(&app, get("/health/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(
        body["models"],
        json!({"disease": true, "irrigation": false, "yield": false})
    );
    assert_eq!(body["remote_recommendations"], false);
}

#[tokio::test]
async fn test_irrigation_prediction_is_stored() {
    let (app, state, _temp_dir) = create_test_app().await;

    let (status, body) = send(
        &app,
        post_json(
            "/predict/irrigation/",
            json!({"temperature": 27, "humidity": 70, "previous_moisture": 20.0}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predicted_moisture"], json!(IRRIGATION_LOW));
    assert_eq!(body["recommendation"], "Irrigation Needed");
    let db_id = body["db_id"].as_str().unwrap().to_string();

    let stored = state
        .store
        .get(Collection::IrrigationPredictions, &db_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.document["input_features"]["previous_moisture"], json!(20.0));
    assert_eq!(stored.document["result"]["recommendation"], "Irrigation Needed");
    assert!(state.models.status().irrigation);
}

#[tokio::test]
async fn test_irrigation_accepts_empty_body_and_unknown_keys() {
    let (app, _state, _temp_dir) = create_test_app().await;

    let (status, body) = send(&app, post_json("/predict/irrigation", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predicted_moisture"], json!(IRRIGATION_LOW));

    let (status, body) = send(
        &app,
        post_json(
            "/predict/irrigation",
            json!({"Soil_Moisture": 36.0, "sensor_battery": "low"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predicted_moisture"], json!(IRRIGATION_HIGH));
    assert_eq!(body["recommendation"], "No Irrigation Required");
}

#[tokio::test]
async fn test_irrigation_accepts_numeric_strings() {
    let (app, state, _temp_dir) = create_test_app().await;

    let (status, body) = send(
        &app,
        post_json(
            "/predict/irrigation",
            json!({"previous_moisture": "36.0", "soil_type": 2.0, "humidity": " 70 "}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predicted_moisture"], json!(IRRIGATION_HIGH));
    assert_eq!(body["recommendation"], "No Irrigation Required");

    let stored = state
        .store
        .get(
            Collection::IrrigationPredictions,
            body["db_id"].as_str().unwrap(),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.document["input_features"]["previous_moisture"], "36.0");
}

#[tokio::test]
async fn test_yield_accepts_numeric_strings() {
    let (app, _state, _temp_dir) = create_test_app().await;

    let mut body = yield_body(0.0);
    body["area"] = json!("10");
    body["ph"] = json!("6.5");
    let (status, body) = send(&app, post_json("/predict/yield", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predicted_yield"], json!(YIELD_LARGE));
}

#[tokio::test]
async fn test_yield_prediction() {
    let (app, _state, _temp_dir) = create_test_app().await;

    let (status, body) = send(&app, post_json("/predict/yield", yield_body(1.5))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predicted_yield"], json!(YIELD_SMALL));
    assert_eq!(body["unit"], "tons");
    assert!(body["db_id"].is_string());

    let (_, body) = send(&app, post_json("/predict/yield/", yield_body(10.0))).await;
    assert_eq!(body["predicted_yield"], json!(YIELD_LARGE));
}

#[tokio::test]
async fn test_yield_missing_field_is_rejected() {
    let (app, _state, _temp_dir) = create_test_app().await;

    let mut body = yield_body(1.0);
    body.as_object_mut().unwrap().remove("area");
    let (status, _) = send(&app, post_json("/predict/yield", body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_disease_prediction_png_and_jpeg() {
    let (app, state, _temp_dir, classifier) = create_disease_app().await;

    for (content_type, format) in [("image/png", ImageFormat::Png), ("image/jpeg", ImageFormat::Jpeg)] {
        let (status, body) = send(
            &app,
            post_image("/predict/disease/", content_type, &encode_image(format)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["predicted_class"], "Tomato___Late_blight");
        let confidence = body["confidence"].as_f64().unwrap();
        assert!(confidence > 0.5 && confidence <= 1.0);
        assert!(body["db_id"].is_string());
    }

    let recent = state
        .store
        .query_recent(Collection::DiseasePredictions, 10)
        .await
        .unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].document["input_features"]["content_type"], "image/jpeg");
    assert_eq!(classifier.call_count(), 2);
}

#[tokio::test]
async fn test_disease_rejects_other_content_types() {
    let (app, _state, _temp_dir, classifier) = create_disease_app().await;

    let (status, body) = send(
        &app,
        post_image("/predict/disease", "image/gif", b"GIF89a"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid image format. Upload JPG or PNG.");
    assert_eq!(classifier.call_count(), 0);
}

#[tokio::test]
async fn test_disease_rejects_undecodable_image() {
    let (app, _state, _temp_dir, classifier) = create_disease_app().await;

    let (status, body) = send(
        &app,
        post_image("/predict/disease", "image/png", b"not really a png"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid image file"));
    assert_eq!(classifier.call_count(), 0);
}

#[tokio::test]
async fn test_missing_model_is_a_server_error() {
    let temp_dir = create_temp_dir();
    let models = create_test_models(&temp_dir).await;
    let state = create_test_state(models, None, Recommender::disabled()).await;
    let app = router(state, 1024 * 1024);

    let (status, body) = send(
        &app,
        post_image("/predict/disease", "image/png", &encode_image(ImageFormat::Png)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("Disease model not found"));
    assert!(error.contains("disease_model.onnx"));
}

#[tokio::test]
async fn test_recommend_falls_back_without_backend() {
    let (app, _state, _temp_dir) = create_test_app().await;

    let (status, body) = send(
        &app,
        post_json(
            "/ai/recommend",
            json!({
                "task_type": "Yield Prediction",
                "inputs": {"area": 1.5},
                "prediction": {"predicted_yield": 4.2, "unit": "tons"}
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["recommendation"].as_str().unwrap().contains("4.20"));
}

#[tokio::test]
async fn test_recommend_uses_backend_text() {
    let temp_dir = create_temp_dir();
    let models = create_test_models(&temp_dir).await;
    let client = Arc::new(
        MockLlmClient::new().with_responses(vec![text_response("Scout the lower leaves daily.")]),
    );
    let config = LlmConfig {
        api_key: "test-key".to_string(),
        ..LlmConfig::default()
    };
    let state = create_test_state(
        models,
        None,
        Recommender::with_client(client.clone(), &config),
    )
    .await;
    let app = router(state, 1024 * 1024);

    let (status, body) = send(
        &app,
        post_json(
            "/ai/recommend/",
            json!({
                "task_type": "Disease Detection",
                "inputs": {},
                "prediction": {"predicted_class": "Tomato___Late_blight"}
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recommendation"], "Scout the lower leaves daily.");
    let requests = client.get_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].messages[1].content.contains("Tomato___Late_blight"));
}

#[tokio::test]
async fn test_recommend_backend_error_falls_back() {
    let temp_dir = create_temp_dir();
    let models = create_test_models(&temp_dir).await;
    let client = Arc::new(MockLlmClient::new().with_error("quota exceeded".to_string()));
    let config = LlmConfig {
        api_key: "test-key".to_string(),
        ..LlmConfig::default()
    };
    let state = create_test_state(
        models,
        None,
        Recommender::with_client(client.clone(), &config),
    )
    .await;
    let app = router(state, 1024 * 1024);

    let (status, body) = send(
        &app,
        post_json(
            "/ai/recommend",
            json!({
                "task_type": "Yield Prediction",
                "inputs": {"area": 1.5},
                "prediction": {"predicted_yield": 4.2, "unit": "tons"}
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["recommendation"].as_str().unwrap().contains("4.20"));
    assert_eq!(client.get_requests().len(), 1);
}

#[tokio::test]
async fn test_recent_predictions_listing() {
    let (app, _state, _temp_dir) = create_test_app().await;

    for area in [1.0, 5.0, 1.5] {
        let (status, _) = send(&app, post_json("/predict/yield", yield_body(area))).await;
        assert_eq!(status, StatusCode::OK);
        tokio::time::sleep(tokio::time::Duration::from_millis(2)).await;
    }

    let (status, body) = send(&app, get("/predictions/yield?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["collection"], "yield_predictions");
    assert_eq!(body["count"], 2);
    let records = body["records"].as_array().unwrap();
    assert_eq!(records[0]["document"]["input_features"]["area"], json!(1.5));
    assert_eq!(records[1]["document"]["input_features"]["area"], json!(5.0));

    let (_, body) = send(&app, get("/predictions/yield/")).await;
    assert_eq!(body["count"], 3);

    let (_, body) = send(&app, get("/predictions/irrigation")).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_unknown_prediction_task_is_not_found() {
    let (app, _state, _temp_dir) = create_test_app().await;

    let (status, body) = send(&app, get("/predictions/fertilizer")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("fertilizer"));
}

#[tokio::test]
async fn test_sensor_ingest() {
    let (app, state, _temp_dir) = create_test_app().await;

    let (status, body) = send(
        &app,
        post_json(
            "/sensor",
            json!({
                "sensor_id": "field-7",
                "temp_C": 22.5,
                "humidity_pct": 64.0,
                "soil_moisture_pct": 29.5,
                "pH": 6.8
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let inserted_id = body["inserted_id"].as_str().unwrap();
    let stored = state
        .store
        .get(Collection::SensorReadings, inserted_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.document["sensor_id"], "field-7");
    assert!(stored.document["timestamp"].is_string());
}
