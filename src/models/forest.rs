//! Tree-ensemble regressor exported from a fitted random forest.
//!
//! Each tree is stored as the flat node arrays of the training library
//! (`children_left`, `children_right`, `feature`, `threshold`, `value`); a
//! node whose left child is `-1` is a leaf.

use super::Regressor;
use crate::{Error, Result, features::FeatureRow};
use serde::{Deserialize, Serialize};
use std::path::Path;

const LEAF: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestRegressor {
    pub feature_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<StandardScaler>,
    pub trees: Vec<Tree>,
}

impl ForestRegressor {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
            .map_err(|e| Error::model_load(format!("{}: {e}", path.display())))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let forest: Self = serde_json::from_str(json)?;
        forest.validate()?;
        Ok(forest)
    }

    /// Rejects an artifact whose columns differ from the schema in name or order.
    pub fn ensure_columns(&self, columns: &[&str]) -> Result<()> {
        let matches = self.feature_names.len() == columns.len()
            && self.feature_names.iter().zip(columns).all(|(a, b)| a == b);
        if !matches {
            return Err(Error::model_load(format!(
                "model was trained on {:?} but the service sends {:?}",
                self.feature_names, columns
            )));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let n_features = self.feature_names.len();
        if n_features == 0 {
            return Err(Error::model_load("forest declares no features"));
        }
        if self.trees.is_empty() {
            return Err(Error::model_load("forest has no trees"));
        }
        if let Some(scaler) = &self.scaler {
            if scaler.mean.len() != n_features || scaler.scale.len() != n_features {
                return Err(Error::model_load(format!(
                    "scaler has {}/{} entries for {} features",
                    scaler.mean.len(),
                    scaler.scale.len(),
                    n_features
                )));
            }
        }

        for (t, tree) in self.trees.iter().enumerate() {
            let n = tree.children_left.len();
            if n == 0 {
                return Err(Error::model_load(format!("tree {t} is empty")));
            }
            if [
                tree.children_right.len(),
                tree.feature.len(),
                tree.threshold.len(),
                tree.value.len(),
            ]
            .iter()
            .any(|len| *len != n)
            {
                return Err(Error::model_load(format!(
                    "tree {t} has node arrays of different lengths"
                )));
            }
            for node in 0..n {
                if tree.children_left[node] == LEAF {
                    continue;
                }
                let in_range = |child: i64| child > 0 && (child as usize) < n;
                if !in_range(tree.children_left[node]) || !in_range(tree.children_right[node]) {
                    return Err(Error::model_load(format!(
                        "tree {t} node {node} points outside the tree"
                    )));
                }
                let feature = tree.feature[node];
                if feature < 0 || feature as usize >= n_features {
                    return Err(Error::model_load(format!(
                        "tree {t} node {node} splits on unknown feature {feature}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn scale(&self, values: &[f64]) -> Vec<f64> {
        match &self.scaler {
            Some(scaler) => values
                .iter()
                .zip(scaler.mean.iter().zip(&scaler.scale))
                .map(|(x, (mean, scale))| {
                    // zero-variance columns are left unscaled
                    let scale = if *scale == 0.0 { 1.0 } else { *scale };
                    (x - mean) / scale
                })
                .collect(),
            None => values.to_vec(),
        }
    }
}

impl Tree {
    fn predict(&self, x: &[f64]) -> Result<f64> {
        let mut node = 0usize;
        // Every step moves to a child, so a well-formed tree ends within n steps.
        for _ in 0..self.children_left.len() {
            if self.children_left[node] == LEAF {
                return Ok(self.value[node]);
            }
            let feature = self.feature[node] as usize;
            node = if x[feature] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        Err(Error::inference("tree traversal did not reach a leaf"))
    }
}

impl Regressor for ForestRegressor {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, row: &FeatureRow) -> Result<f64> {
        if row.len() != self.feature_names.len() {
            return Err(Error::inference(format!(
                "expected {} features, got {}",
                self.feature_names.len(),
                row.len()
            )));
        }
        let x = self.scale(row.values());
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.predict(&x)?;
        }
        Ok(total / self.trees.len() as f64)
    }
}
