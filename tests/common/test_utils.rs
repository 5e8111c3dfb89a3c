use agri_serve::{
    config::{Config, LogsConfig, ModelsConfig, ServerConfig},
    features::{IRRIGATION, YIELD},
    models::{DiseaseModel, ModelRegistry},
    recommend::Recommender,
    server::AppState,
    storage::PredictionStore,
};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use serde_json::{Value, json};
use std::{io::Cursor, path::Path, sync::Arc};
use tempfile::TempDir;

/// Moisture model: `Previous_Soil_Moisture <= 30` predicts 18.0, otherwise 45.0.
pub const IRRIGATION_LOW: f64 = 18.0;
pub const IRRIGATION_HIGH: f64 = 45.0;
/// Yield model: `area <= 2` predicts 4.2, otherwise 8.0.
pub const YIELD_SMALL: f64 = 4.2;
pub const YIELD_LARGE: f64 = 8.0;

/// Create a temporary directory for test files
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// A single split on `feature`, in the exported forest layout.
pub fn stump_forest(
    feature_names: &[&str],
    feature: usize,
    threshold: f64,
    low: f64,
    high: f64,
) -> Value {
    json!({
        "feature_names": feature_names,
        "trees": [{
            "children_left": [1, -1, -1],
            "children_right": [2, -1, -1],
            "feature": [feature, -2, -2],
            "threshold": [threshold, -2.0, -2.0],
            "value": [0.0, low, high]
        }]
    })
}

pub async fn write_json(path: &Path, value: &Value) -> String {
    tokio::fs::write(path, value.to_string()).await.unwrap();
    path.to_string_lossy().to_string()
}

pub async fn write_irrigation_model(path: &Path) -> String {
    let forest = stump_forest(IRRIGATION.columns, 4, 30.0, IRRIGATION_LOW, IRRIGATION_HIGH);
    write_json(path, &forest).await
}

pub async fn write_yield_model(path: &Path) -> String {
    let forest = stump_forest(YIELD.columns, 1, 2.0, YIELD_SMALL, YIELD_LARGE);
    write_json(path, &forest).await
}

/// Regressor artifacts written to `dir`; the disease artifact is left missing.
pub async fn create_test_models(dir: &TempDir) -> ModelsConfig {
    let irrigation = write_irrigation_model(&dir.path().join("irrigation_model.json")).await;
    let yield_path = write_yield_model(&dir.path().join("yield_model.json")).await;

    ModelsConfig {
        disease_model_path: dir
            .path()
            .join("disease_model.onnx")
            .to_string_lossy()
            .to_string(),
        disease_labels_path: None,
        irrigation_model_path: irrigation,
        yield_model_path: yield_path,
        preload: false,
    }
}

/// Create a test configuration with sensible defaults
pub fn create_test_config(models: ModelsConfig) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: ":memory:".to_string(),
            logs: LogsConfig {
                level: "debug".to_string(),
            },
            max_upload_bytes: 1024 * 1024,
        },
        models,
        llm: None,
    }
}

pub async fn create_test_state(
    models: ModelsConfig,
    disease: Option<Arc<DiseaseModel>>,
    recommender: Recommender,
) -> AppState {
    let store = PredictionStore::new(":memory:").await.unwrap();
    AppState {
        models: Arc::new(ModelRegistry::with_models(models, disease, None, None)),
        store: Arc::new(store),
        recommender: Arc::new(recommender),
    }
}

pub fn encode_image(format: ImageFormat) -> Vec<u8> {
    let buffer = ImageBuffer::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 90]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(buffer)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

/// Hand-built multipart body with a single `file` part.
pub fn multipart_body(boundary: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
