//! # Configuration
//!
//! Settings for the binding engine, loaded from environment variables.

mod binding;

pub use binding::BindingConfig;
