//! Chart errors

use thiserror::Error;

/// Errors raised while resolving images or applying charts
#[derive(Debug, Error)]
pub enum ChartError {
    /// Spawning helm or reading an override file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// helm exited unsuccessfully
    #[error("helm {command} failed for release {release}: {stderr}")]
    Helm {
        /// helm subcommand, e.g. `upgrade`
        command: String,
        /// Release name
        release: String,
        /// Captured error output
        stderr: String,
    },

    /// Values or image vector could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A chart declares an image the image vector does not know
    #[error("Image not found in image vector: {0}")]
    ImageNotFound(String),

    /// Values are not a JSON object
    #[error("Invalid values: {0}")]
    InvalidValues(String),
}

impl From<serde_yaml::Error> for ChartError {
    fn from(e: serde_yaml::Error) -> Self {
        ChartError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for ChartError {
    fn from(e: serde_json::Error) -> Self {
        ChartError::Serialization(e.to_string())
    }
}
