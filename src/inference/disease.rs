use crate::{
    Error, Result,
    constants::{DISEASE_CONFIDENCE_THRESHOLD, IMAGE_SIZE, IMAGENET_MEAN, IMAGENET_STD},
    models::DiseaseModel,
};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseasePrediction {
    pub predicted_class: String,
    pub confidence: f64,
}

/// Runs decode, preprocessing and the forward pass on a blocking worker.
pub async fn predict_disease(model: Arc<DiseaseModel>, image: Vec<u8>) -> Result<DiseasePrediction> {
    tokio::task::spawn_blocking(move || classify(&model, &image))
        .await
        .map_err(|e| Error::internal(format!("disease inference task failed: {e}")))?
}

pub fn classify(model: &DiseaseModel, image: &[u8]) -> Result<DiseasePrediction> {
    let input = preprocess(image)?;
    let logits = model.classifier().logits(&input)?;
    let probabilities = softmax(&logits)?;

    let (index, confidence) = probabilities
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| Error::inference("classifier produced no scores"))?;
    let predicted_class = model
        .labels()
        .get(index)
        .cloned()
        .ok_or_else(|| Error::inference(format!("no label for class index {index}")))?;

    if confidence < DISEASE_CONFIDENCE_THRESHOLD {
        warn!(
            "Low-confidence disease prediction: {} ({:.3})",
            predicted_class, confidence
        );
    } else {
        debug!("Disease prediction: {} ({:.3})", predicted_class, confidence);
    }

    Ok(DiseasePrediction {
        predicted_class,
        confidence,
    })
}

/// Decodes JPEG/PNG bytes into the normalized `[1, 3, 224, 224]` layout the
/// classifier was trained on.
pub fn preprocess(bytes: &[u8]) -> Result<Vec<f32>> {
    let image = image::load_from_memory(bytes).map_err(|e| Error::InvalidImage(e.to_string()))?;
    let resized = image
        .resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle)
        .to_rgb8();

    let plane = (IMAGE_SIZE * IMAGE_SIZE) as usize;
    let mut input = vec![0.0f32; 3 * plane];
    for (i, pixel) in resized.pixels().enumerate() {
        for channel in 0..3 {
            let value = pixel[channel] as f32 / 255.0;
            input[channel * plane + i] = (value - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
        }
    }
    Ok(input)
}

/// Numerically stable softmax, widened to f64.
pub fn softmax(logits: &[f32]) -> Result<Vec<f64>> {
    if logits.is_empty() {
        return Err(Error::inference("classifier produced no scores"));
    }
    if logits.iter().any(|l| !l.is_finite()) {
        return Err(Error::inference("classifier produced non-finite scores"));
    }
    let max = logits.iter().fold(f32::NEG_INFINITY, |m, l| m.max(*l)) as f64;
    let exps: Vec<f64> = logits.iter().map(|l| (*l as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    Ok(exps.into_iter().map(|e| e / sum).collect())
}
