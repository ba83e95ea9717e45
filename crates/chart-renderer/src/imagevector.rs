//! Image vector
//!
//! Maps logical image names used by charts to concrete image references.
//! The document format is
//!
//! ```yaml
//! images:
//! - name: loki
//!   sourceRepository: github.com/grafana/loki
//!   repository: docker.io/grafana/loki
//!   tag: "2.2.1"
//! ```
//!
//! An override document with the same shape can replace entries by name.

use crate::error::ChartError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Environment variable naming an override image vector file
pub const OVERRIDE_ENV: &str = "IMAGEVECTOR_OVERWRITE";

/// One image entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    /// Name charts refer to the image by
    pub name: String,
    /// Upstream source of the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_repository: Option<String>,
    /// Registry repository
    pub repository: String,
    /// Tag; the repository alone is used without it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) if tag.starts_with("sha256:") => write!(f, "{}@{}", self.repository, tag),
            Some(tag) => write!(f, "{}:{}", self.repository, tag),
            None => write!(f, "{}", self.repository),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageVectorDocument {
    #[serde(default)]
    images: Vec<ImageSource>,
}

/// Ordered set of image sources, looked up by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageVector {
    images: Vec<ImageSource>,
}

impl ImageVector {
    /// Parse an image vector document
    pub fn from_yaml(yaml: &str) -> Result<Self, ChartError> {
        let doc: ImageVectorDocument = serde_yaml::from_str(yaml)?;
        Ok(Self { images: doc.images })
    }

    /// Replace or append every entry of `overrides`, keyed by name
    #[must_use]
    pub fn with_overrides(mut self, overrides: ImageVector) -> Self {
        for image in overrides.images {
            match self.images.iter_mut().find(|existing| existing.name == image.name) {
                Some(existing) => *existing = image,
                None => self.images.push(image),
            }
        }
        self
    }

    /// Apply the override file named by `IMAGEVECTOR_OVERWRITE`, if set
    pub fn with_env_override(self) -> Result<Self, ChartError> {
        match std::env::var(OVERRIDE_ENV) {
            Ok(path) if !path.is_empty() => {
                let overrides = Self::from_file(Path::new(&path))?;
                Ok(self.with_overrides(overrides))
            }
            _ => Ok(self),
        }
    }

    /// Read an image vector from a file
    pub fn from_file(path: &Path) -> Result<Self, ChartError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Look up an image by name
    pub fn find_image(&self, name: &str) -> Result<&ImageSource, ChartError> {
        self.images
            .iter()
            .find(|image| image.name == name)
            .ok_or_else(|| ChartError::ImageNotFound(name.to_string()))
    }

    /// Resolve several images to `name -> reference`
    pub fn find_images<'a, I>(&self, names: I) -> Result<serde_json::Map<String, serde_json::Value>, ChartError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolved = serde_json::Map::new();
        for name in names {
            let image = self.find_image(name)?;
            resolved.insert(name.to_string(), serde_json::Value::String(image.to_string()));
        }
        Ok(resolved)
    }
}
