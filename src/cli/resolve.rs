//! # Resolve Command
//!
//! Runs one resolution pass and optionally synthesizes the derived Secret.

use crate::{OutputFormat, Session};
use anyhow::{Context, Result};
use binding_secret_controller::binding::handlers::parse_gvk;
use binding_secret_controller::binding::{
    owner_reference_for, Resolution, ResolutionOutcome, Resolver, SecretDescriptor,
    SecretSynthesizer,
};
use binding_secret_controller::client::ResourceClient;
use kube::core::{ApiResource, DynamicObject};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveReport {
    source: String,
    keys: Vec<String>,
    fingerprint: String,
    derived_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<bool>,
    errors: Vec<String>,
}

/// Fetch the source resource named on the command line
pub(crate) async fn fetch_source(session: &Session, kind: &str, name: &str) -> Result<DynamicObject> {
    let gvk = parse_gvk(kind)
        .with_context(|| format!("'{kind}' is not <group>/<version>/<Kind>"))?;
    let resource = ApiResource::from_gvk(&gvk);
    session
        .client
        .get(&resource, &session.namespace, name)
        .await
        .with_context(|| format!("Failed to get {} '{}/{name}'", gvk.kind, session.namespace))
}

/// Resolve the bindings of a source, failing when the abort policy stopped the pass
pub(crate) async fn resolve_source(session: &Session, source: &DynamicObject) -> Result<Resolution> {
    let resolver = Resolver::new(
        Arc::clone(&session.client),
        &session.config.annotation_prefix,
        session.config.failure_policy,
    );
    match resolver.resolve(source).await {
        ResolutionOutcome::Done(resolution) => Ok(resolution),
        ResolutionOutcome::Failed(failure) => Err(anyhow::anyhow!(
            "Resolution aborted at {failure}\n  Remediation: {}",
            failure.error.remediation()
        )),
    }
}

/// Resolve a source and print the result. Returns false when any binding failed.
pub async fn resolve_command(
    session: &Session,
    kind: &str,
    name: &str,
    apply: bool,
    base_name: Option<String>,
) -> Result<bool> {
    let source = fetch_source(session, kind, name).await?;
    let resolution = resolve_source(session, &source).await?;
    let base_name = base_name.unwrap_or_else(|| name.to_string());

    let (descriptor, created) = if apply {
        let owner = owner_reference_for(&source).context("Cannot reference the source as owner")?;
        let synthesized = SecretSynthesizer::new(
            Arc::clone(&session.client),
            session.config.comparison_mode,
        )
        .synthesize(&session.namespace, &base_name, &resolution.payload, Some(owner))
        .await
        .context("Failed to synthesize derived Secret")?;
        (synthesized.descriptor, Some(synthesized.created))
    } else {
        (
            SecretDescriptor::new(&session.namespace, &base_name, resolution.payload.clone(), None),
            None,
        )
    };

    let report = ResolveReport {
        source: format!("{}/{name}", session.namespace),
        keys: descriptor.payload.keys().cloned().collect(),
        fingerprint: descriptor.fingerprint.clone(),
        derived_name: descriptor.name.clone(),
        created,
        errors: resolution.errors.iter().map(ToString::to_string).collect(),
    };
    print_report(&report, session.output)?;

    Ok(!resolution.is_partial())
}

fn print_report(report: &ResolveReport, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(report)?),
        OutputFormat::Text => {
            println!("Source: {}", report.source);
            println!("Derived Secret: {}", report.derived_name);
            println!("Fingerprint: {}", report.fingerprint);
            if let Some(created) = report.created {
                println!("Created: {created}");
            }
            println!("Keys ({}):", report.keys.len());
            for key in &report.keys {
                println!("  {key}");
            }
            if !report.errors.is_empty() {
                println!("Errors ({}):", report.errors.len());
                for error in &report.errors {
                    println!("  {error}");
                }
            }
        }
    }
    Ok(())
}
