//! # Binding Engine
//!
//! Turns binding annotations on a source resource into a derived Secret.
//!
//! ```text
//! annotations -> Resolver -> handler per declaration -> fragments
//!             -> merged Payload -> SecretSynthesizer -> <base>-<fingerprint> Secret
//! ```

pub mod comparator;
pub mod declaration;
pub mod fingerprint;
pub mod handlers;
pub mod payload;
pub mod resolver;
pub mod synthesizer;

pub use comparator::{compare, ComparisonMode, ComparisonResult, Mismatch, MismatchReason};
pub use declaration::{BindingDeclaration, FieldPath};
pub use fingerprint::{derived_name, fingerprint};
pub use payload::{Fragment, Payload};
pub use resolver::{FailurePolicy, Phase, Resolution, ResolutionOutcome, Resolver};
pub use synthesizer::{owner_reference_for, SecretDescriptor, SecretSynthesizer, Synthesized};
