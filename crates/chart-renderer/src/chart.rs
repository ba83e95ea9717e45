//! Chart component descriptors

use crate::applier_trait::ChartApplierTrait;
use crate::error::ChartError;
use crate::imagevector::ImageVector;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A chart, the images it needs and its sub-charts
///
/// Sub-charts live under `<path>/charts/<name>` and receive their images
/// under `<name>.images` in the values tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chart {
    /// Chart name, also the key of its sub-chart values
    pub name: String,
    /// Chart directory
    pub path: PathBuf,
    /// Image vector names injected under `images`
    pub images: Vec<String>,
    /// Nested charts
    pub sub_charts: Vec<Chart>,
}

impl Chart {
    /// A chart without sub-charts
    pub fn new(name: &str, path: impl Into<PathBuf>, images: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            path: path.into(),
            images: images.iter().map(|i| (*i).to_string()).collect(),
            sub_charts: Vec::new(),
        }
    }

    /// Add a sub-chart under `<path>/charts/<name>`
    #[must_use]
    pub fn with_sub_chart(mut self, name: &str, images: &[&str]) -> Self {
        let path = self.path.join("charts").join(name);
        self.sub_charts.push(Chart::new(name, path, images));
        self
    }

    /// Every image of this chart and its sub-charts
    pub fn all_images(&self) -> Vec<&str> {
        let mut images: Vec<&str> = self.images.iter().map(String::as_str).collect();
        for sub in &self.sub_charts {
            images.extend(sub.all_images());
        }
        images
    }

    /// Add resolved image references to `values`
    pub fn inject_images(&self, image_vector: &ImageVector, mut values: Value) -> Result<Value, ChartError> {
        let root = values
            .as_object_mut()
            .ok_or_else(|| ChartError::InvalidValues(format!("values for chart {} must be an object", self.name)))?;

        if !self.images.is_empty() {
            let images = image_vector.find_images(self.images.iter().map(String::as_str))?;
            root.insert("images".to_string(), Value::Object(images));
        }

        for sub in &self.sub_charts {
            let sub_values = root
                .remove(&sub.name)
                .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
            let sub_values = sub.inject_images(image_vector, sub_values)?;
            root.insert(sub.name.clone(), sub_values);
        }
        Ok(values)
    }

    /// Render and install this chart into `namespace`
    pub async fn apply(&self, applier: &dyn ChartApplierTrait, charts_root: &Path, namespace: &str, image_vector: &ImageVector, values: Value) -> Result<(), ChartError> {
        let values = self.inject_images(image_vector, values)?;
        let path = charts_root.join(&self.path);
        debug!("Applying chart {} from {} into {}", self.name, path.display(), namespace);
        applier.apply(&self.name, &path, namespace, &values).await?;
        info!("Applied chart {} in namespace {}", self.name, namespace);
        Ok(())
    }

    /// Remove this chart from `namespace`
    pub async fn delete(&self, applier: &dyn ChartApplierTrait, namespace: &str) -> Result<(), ChartError> {
        applier.delete(&self.name, namespace).await?;
        info!("Deleted chart {} in namespace {}", self.name, namespace);
        Ok(())
    }
}
