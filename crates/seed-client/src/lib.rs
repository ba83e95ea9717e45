//! Seed Cluster Client
//!
//! Everything the logging extension reads from or writes to the seed's API
//! server goes through [`SeedClientTrait`]; certificate material goes through
//! [`SecretsManagerTrait`]. Both have kube-backed implementations and, behind
//! the `test-util` feature, in-memory mocks for unit tests.
//!
//! # Example
//!
//! ```no_run
//! use seed_client::{SeedClient, SeedClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SeedClient::new(kube::Client::try_default().await?);
//! if let Some(logging) = client.get_logging("garden", "logging").await? {
//!     println!("found {:?}", logging.spec);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod objects;
pub mod secrets;
#[path = "trait.rs"]
pub mod seed_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::SeedClient;
pub use error::SeedError;
pub use objects::{ObjectKind, ObjectRef, ResourceRequests};
pub use secrets::{CertificateKind, SecretBundle, SecretConfig, SecretsManager, SecretsManagerTrait};
pub use seed_trait::SeedClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{MockSecretsManager, MockSeedClient};
