//! # Delete Command

use crate::Session;
use anyhow::{Context, Result};
use binding_secret_controller::binding::SecretSynthesizer;
use std::sync::Arc;

/// Delete a derived Secret; a missing Secret is not an error
pub async fn delete_command(session: &Session, secret: &str) -> Result<bool> {
    let deleted = SecretSynthesizer::new(Arc::clone(&session.client), session.config.comparison_mode)
        .delete(&session.namespace, secret)
        .await
        .with_context(|| format!("Failed to delete Secret '{}/{secret}'", session.namespace))?;

    if deleted {
        println!("🗑️  Deleted Secret '{}/{secret}'", session.namespace);
    } else {
        println!("Secret '{}/{secret}' not found, nothing to delete", session.namespace);
    }
    Ok(true)
}
