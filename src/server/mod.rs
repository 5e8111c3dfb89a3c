pub mod handlers;
pub mod types;

pub use handlers::AppState;

use crate::{
    Result, config::Config, models::ModelRegistry, recommend::Recommender,
    storage::PredictionStore,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{MethodRouter, get, post},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Registers `path` and `path/` with the same handler.
fn route_with_slash(
    router: Router<AppState>,
    path: &str,
    method: MethodRouter<AppState>,
) -> Router<AppState> {
    router
        .route(path, method.clone())
        .route(&format!("{path}/"), method)
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let mut router = Router::new().route("/", get(handlers::root));
    router = route_with_slash(router, "/health", get(handlers::health));
    router = route_with_slash(router, "/predict/disease", post(handlers::predict_disease));
    router = route_with_slash(
        router,
        "/predict/irrigation",
        post(handlers::predict_irrigation),
    );
    router = route_with_slash(router, "/predict/yield", post(handlers::predict_yield));
    router = route_with_slash(router, "/ai/recommend", post(handlers::recommend));
    router = route_with_slash(
        router,
        "/predictions/:task",
        get(handlers::recent_predictions),
    );
    router = route_with_slash(router, "/sensor", post(handlers::ingest_sensor));

    router
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let store = PredictionStore::new(&config.server.database_path).await?;

    let models = ModelRegistry::new(config.models.clone());
    if config.models.preload {
        info!("Preloading model artifacts");
        models.warm_up().await;
    }

    let recommender = Recommender::from_config(config.llm.as_ref());

    let app_state = AppState {
        models: Arc::new(models),
        store: Arc::new(store),
        recommender: Arc::new(recommender),
    };

    let app = router(app_state, config.server.max_upload_bytes);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
