//! Model artifacts and the registry that loads each of them at most once.

mod forest;
mod onnx;

pub use forest::{ForestRegressor, StandardScaler, Tree};
pub use onnx::OnnxClassifier;

use crate::{
    Error, Result,
    config::ModelsConfig,
    constants::{DISEASE_LABELS, IMAGE_SIZE},
    features::{self, FeatureRow, FeatureSchema},
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Produces raw class scores for one preprocessed NCHW image.
pub trait ImageClassifier: Send + Sync {
    fn num_classes(&self) -> usize;
    fn logits(&self, input: &[f32]) -> Result<Vec<f32>>;
}

/// Point prediction over a normalized feature row.
pub trait Regressor: Send + Sync {
    fn feature_names(&self) -> &[String];
    fn predict(&self, row: &FeatureRow) -> Result<f64>;
}

/// Classifier weights together with the label list they were trained with.
pub struct DiseaseModel {
    classifier: Arc<dyn ImageClassifier>,
    labels: Vec<String>,
}

impl DiseaseModel {
    pub fn new(classifier: Arc<dyn ImageClassifier>, labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::model_load("disease label list is empty"));
        }
        if classifier.num_classes() != labels.len() {
            return Err(Error::model_load(format!(
                "classifier has {} outputs but {} labels were provided",
                classifier.num_classes(),
                labels.len()
            )));
        }
        Ok(Self { classifier, labels })
    }

    pub fn classifier(&self) -> &Arc<dyn ImageClassifier> {
        &self.classifier
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn load(model_path: &Path, labels_path: Option<&Path>) -> Result<Self> {
        let labels = match labels_path {
            Some(path) => read_labels(path)?,
            None => DISEASE_LABELS.iter().map(|l| l.to_string()).collect(),
        };
        let size = IMAGE_SIZE as usize;
        let classifier = OnnxClassifier::load(model_path, &[1, 3, size, size])?;
        Self::new(Arc::new(classifier), labels)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelsFile {
    Wrapped { classes: Vec<String> },
    Bare(Vec<String>),
}

fn read_labels(path: &Path) -> Result<Vec<String>> {
    let json = std::fs::read_to_string(path)?;
    let labels: LabelsFile = serde_json::from_str(&json)
        .map_err(|e| Error::model_load(format!("{}: {e}", path.display())))?;
    Ok(match labels {
        LabelsFile::Wrapped { classes } => classes,
        LabelsFile::Bare(classes) => classes,
    })
}

fn load_forest(path: &Path, schema: &FeatureSchema) -> Result<Arc<dyn Regressor>> {
    let forest = ForestRegressor::load(path)?;
    forest.ensure_columns(schema.columns)?;
    Ok(Arc::new(forest))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelStatus {
    pub disease: bool,
    pub irrigation: bool,
    #[serde(rename = "yield")]
    pub yield_model: bool,
}

/// Process-wide model handles. Each artifact is deserialized on first use and
/// shared read-only afterwards; concurrent first requests wait on the same load.
pub struct ModelRegistry {
    config: ModelsConfig,
    disease: OnceCell<Arc<DiseaseModel>>,
    irrigation: OnceCell<Arc<dyn Regressor>>,
    yield_model: OnceCell<Arc<dyn Regressor>>,
}

impl ModelRegistry {
    pub fn new(config: ModelsConfig) -> Self {
        Self {
            config,
            disease: OnceCell::new(),
            irrigation: OnceCell::new(),
            yield_model: OnceCell::new(),
        }
    }

    /// Registry with some handles already in place; the rest load lazily from
    /// `config` as usual.
    pub fn with_models(
        config: ModelsConfig,
        disease: Option<Arc<DiseaseModel>>,
        irrigation: Option<Arc<dyn Regressor>>,
        yield_model: Option<Arc<dyn Regressor>>,
    ) -> Self {
        Self {
            config,
            disease: OnceCell::new_with(disease),
            irrigation: OnceCell::new_with(irrigation),
            yield_model: OnceCell::new_with(yield_model),
        }
    }

    pub async fn disease(&self) -> Result<Arc<DiseaseModel>> {
        let model = self
            .disease
            .get_or_try_init(|| async {
                let model_path = PathBuf::from(&self.config.disease_model_path);
                let labels_path = self.config.disease_labels_path.as_ref().map(PathBuf::from);
                if let Some(path) = &labels_path {
                    ensure_exists("Disease labels", path).await?;
                }
                let model = load_blocking("Disease", model_path, move |path| {
                    DiseaseModel::load(path, labels_path.as_deref())
                })
                .await?;
                Ok::<_, Error>(Arc::new(model))
            })
            .await?;
        Ok(Arc::clone(model))
    }

    pub async fn irrigation(&self) -> Result<Arc<dyn Regressor>> {
        let model = self
            .irrigation
            .get_or_try_init(|| {
                let path = PathBuf::from(&self.config.irrigation_model_path);
                load_blocking("Irrigation", path, |path| {
                    load_forest(path, &features::IRRIGATION)
                })
            })
            .await?;
        Ok(Arc::clone(model))
    }

    pub async fn yield_model(&self) -> Result<Arc<dyn Regressor>> {
        let model = self
            .yield_model
            .get_or_try_init(|| {
                let path = PathBuf::from(&self.config.yield_model_path);
                load_blocking("Yield", path, |path| load_forest(path, &features::YIELD))
            })
            .await?;
        Ok(Arc::clone(model))
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            disease: self.disease.initialized(),
            irrigation: self.irrigation.initialized(),
            yield_model: self.yield_model.initialized(),
        }
    }

    /// Loads every artifact up front. Failures are logged and left for the
    /// first request to surface.
    pub async fn warm_up(&self) {
        if let Err(e) = self.disease().await {
            warn!("Disease model not loaded at startup: {}", e);
        }
        if let Err(e) = self.irrigation().await {
            warn!("Irrigation model not loaded at startup: {}", e);
        }
        if let Err(e) = self.yield_model().await {
            warn!("Yield model not loaded at startup: {}", e);
        }
    }
}

async fn ensure_exists(model: &str, path: &Path) -> Result<()> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::model_not_found(model, path.display().to_string())),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Checks the artifact exists, then deserializes it off the async runtime.
async fn load_blocking<T, F>(model: &'static str, path: PathBuf, load: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Path) -> Result<T> + Send + 'static,
{
    ensure_exists(model, &path).await?;

    info!("Loading {} model from {}", model, path.display());
    let started = Instant::now();
    let loaded = tokio::task::spawn_blocking(move || load(&path))
        .await
        .map_err(|e| Error::internal(format!("{model} model load task failed: {e}")))??;
    info!(
        "{} model loaded in {} ms",
        model,
        started.elapsed().as_millis()
    );

    Ok(loaded)
}
