//! Binding Secret Controller Library
//!
//! Resolves binding annotations on Kubernetes resources into content-addressed
//! Secrets. The watch/reconcile loop lives in the embedding controller; this crate
//! provides one resolution pass and the synthesis of its result.
//!
//! ```no_run
//! use std::sync::Arc;
//! use binding_secret_controller::binding::{owner_reference_for, Resolver, SecretSynthesizer};
//! use binding_secret_controller::client::{KubeResourceClient, ResourceClient};
//! use binding_secret_controller::config::BindingConfig;
//!
//! # async fn run(source: kube::core::DynamicObject) -> anyhow::Result<()> {
//! let config = BindingConfig::from_env();
//! let client: Arc<dyn ResourceClient> =
//!     Arc::new(KubeResourceClient::new(kube::Client::try_default().await?));
//!
//! let resolution = Resolver::new(Arc::clone(&client), &config.annotation_prefix, config.failure_policy)
//!     .resolve(&source)
//!     .await
//!     .into_result()?;
//!
//! let synthesized = SecretSynthesizer::new(client, config.comparison_mode)
//!     .synthesize(
//!         source.metadata.namespace.as_deref().unwrap_or("default"),
//!         source.metadata.name.as_deref().unwrap_or_default(),
//!         &resolution.payload,
//!         Some(owner_reference_for(&source)?),
//!     )
//!     .await?;
//! println!("{} (created: {})", synthesized.descriptor.name, synthesized.created);
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod observability;

pub use error::{BindingError, ClientError};
