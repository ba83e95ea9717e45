//! Chart Renderer
//!
//! Component descriptors ([`Chart`]), image resolution ([`ImageVector`]) and
//! the [`ChartApplierTrait`] seam used by the logging actuators. The
//! production applier shells out to helm; tests use `MockChartApplier`
//! behind the `test-util` feature.
//!
//! # Example
//!
//! ```no_run
//! use chart_renderer::{Chart, HelmChartApplier, ImageVector};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let iv = ImageVector::from_yaml("images: [{name: event-logger, repository: event-logger, tag: v1}]")?;
//! let chart = Chart::new("event-logger", "event-logger", &["event-logger"]);
//! chart
//!     .apply(&HelmChartApplier::new(), Path::new("charts"), "shoot--dev--foo", &iv, serde_json::json!({"replicas": 1}))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod chart;
pub mod error;
pub mod helm;
pub mod imagevector;
#[path = "trait.rs"]
pub mod applier_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use applier_trait::ChartApplierTrait;
pub use chart::Chart;
pub use error::ChartError;
pub use helm::HelmChartApplier;
pub use imagevector::{ImageSource, ImageVector};
#[cfg(feature = "test-util")]
pub use mock::{ChartCall, MockChartApplier};
