//! # Diff Command
//!
//! Compares a Secret with a fixed name against the payload a source resolves to.

use crate::resolve::{fetch_source, resolve_source};
use crate::{OutputFormat, Session};
use anyhow::{Context, Result};
use binding_secret_controller::binding::SecretSynthesizer;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DiffReport {
    secret: String,
    same: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    mismatch: Option<String>,
}

/// Returns whether the Secret already holds the resolved payload
pub async fn diff_command(session: &Session, secret: &str, kind: &str, name: &str) -> Result<bool> {
    let source = fetch_source(session, kind, name).await?;
    let resolution = resolve_source(session, &source).await?;

    let result = SecretSynthesizer::new(Arc::clone(&session.client), session.config.comparison_mode)
        .is_same(&session.namespace, secret, &resolution.payload)
        .await
        .with_context(|| format!("Failed to compare Secret '{}/{secret}'", session.namespace))?;

    let report = DiffReport {
        secret: format!("{}/{secret}", session.namespace),
        same: result.success,
        mismatch: result.mismatch.as_ref().map(ToString::to_string),
    };
    match session.output {
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&report)?),
        OutputFormat::Text => match &report.mismatch {
            None => println!("✅ {} matches ({} keys)", report.secret, resolution.payload.len()),
            Some(mismatch) => println!("❌ {} differs at {mismatch}", report.secret),
        },
    }
    Ok(result.success)
}
