//! # Binding Resolver
//!
//! Runs one resolution pass over a source resource:
//!
//! ```text
//! Parsing -> Dispatching -> Merging -> Done
//!     \            \
//!      `------------`--------------> Failed (abort policy only)
//! ```
//!
//! Declarations are processed in the order the annotations are given and fragments are
//! folded in that same order, so a later declaration wins on duplicate keys.
//!
//! Unknown tags are always skipped with a warning. Malformed annotations and extraction
//! failures follow the configured [`FailurePolicy`].

use crate::binding::declaration::{parse_declarations, BindingDeclaration};
use crate::binding::handlers::{new_handler, Extract};
use crate::binding::payload::{Fragment, Payload};
use crate::client::ResourceClient;
use crate::error::BindingError;
use crate::observability::metrics;
use kube::core::DynamicObject;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// What a pass does when one declaration fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep going, omit the failed keys and report the error with the payload
    #[default]
    BestEffort,
    /// Stop at the first failure; no payload is produced
    Abort,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "besteffort" => Ok(FailurePolicy::BestEffort),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(format!(
                "unknown failure policy '{other}' (expected best-effort or abort)"
            )),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::BestEffort => f.write_str("best-effort"),
            FailurePolicy::Abort => f.write_str("abort"),
        }
    }
}

/// States of a resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parsing,
    Dispatching,
    Merging,
    Done,
    Failed,
}

impl Phase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Parsing => "parsing",
            Phase::Dispatching => "dispatching",
            Phase::Merging => "merging",
            Phase::Done => "done",
            Phase::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure scoped to one annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationError {
    /// Annotation key the failure belongs to
    pub annotation: String,
    /// Phase the failure happened in
    pub phase: Phase,
    pub error: BindingError,
}

impl fmt::Display for DeclarationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.annotation, self.phase, self.error)
    }
}

/// Payload of a finished pass plus any non-fatal errors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub payload: Payload,
    pub errors: Vec<DeclarationError>,
}

impl Resolution {
    /// True when at least one declaration did not contribute
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Terminal state of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Done(Resolution),
    Failed(DeclarationError),
}

impl ResolutionOutcome {
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            ResolutionOutcome::Done(_) => Phase::Done,
            ResolutionOutcome::Failed(_) => Phase::Failed,
        }
    }

    /// Collapse into a `Result`, dropping the annotation context of a failure
    pub fn into_result(self) -> Result<Resolution, BindingError> {
        match self {
            ResolutionOutcome::Done(resolution) => Ok(resolution),
            ResolutionOutcome::Failed(failure) => Err(failure.error),
        }
    }
}

/// Resolves the binding annotations of source resources into payloads
pub struct Resolver {
    client: Arc<dyn ResourceClient>,
    prefix: String,
    policy: FailurePolicy,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("prefix", &self.prefix)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Per-pass bookkeeping; one per call to [`Resolver::resolve`]
struct Pass {
    policy: FailurePolicy,
    errors: Vec<DeclarationError>,
    /// Declarations dropped without aborting
    skipped: usize,
}

impl Pass {
    /// Record a failure; returns it back when the policy says to stop
    fn fail(
        &mut self,
        annotation: &str,
        phase: Phase,
        error: BindingError,
    ) -> Option<DeclarationError> {
        let failure = DeclarationError {
            annotation: annotation.to_string(),
            phase,
            error,
        };
        match self.policy {
            FailurePolicy::Abort => Some(failure),
            FailurePolicy::BestEffort => {
                self.errors.push(failure);
                None
            }
        }
    }

    /// Record an annotation that could not be parsed; returns the failure when the
    /// policy says to stop, otherwise counts the annotation as skipped
    fn reject(&mut self, annotation: &str, error: BindingError) -> Option<DeclarationError> {
        let failure = self.fail(annotation, Phase::Parsing, error);
        if failure.is_none() {
            self.count_skipped();
        }
        failure
    }

    /// Record a failure that never aborts the pass
    fn skip(&mut self, annotation: &str, phase: Phase, error: BindingError) {
        self.errors.push(DeclarationError {
            annotation: annotation.to_string(),
            phase,
            error,
        });
        self.count_skipped();
    }

    fn count_skipped(&mut self) {
        self.skipped += 1;
        metrics::increment_skipped_declarations();
    }
}

impl Resolver {
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>, prefix: impl Into<String>, policy: FailurePolicy) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            policy,
        }
    }

    /// Run one pass over `source`
    pub async fn resolve(&self, source: &DynamicObject) -> ResolutionOutcome {
        let namespace = source.metadata.namespace.clone().unwrap_or_default();
        let name = source.metadata.name.clone().unwrap_or_default();
        let span = info_span!(
            "binding.resolve",
            source.namespace = %namespace,
            source.name = %name,
            policy = %self.policy
        );
        let start = Instant::now();

        let outcome = self.run(source).instrument(span).await;

        metrics::increment_resolutions();
        metrics::observe_resolution_duration(start.elapsed().as_secs_f64());
        match &outcome {
            ResolutionOutcome::Done(resolution) => info!(
                namespace = %namespace,
                name = %name,
                keys = resolution.payload.len(),
                errors = resolution.errors.len(),
                "Resolved bindings"
            ),
            ResolutionOutcome::Failed(failure) => warn!(
                namespace = %namespace,
                name = %name,
                "Resolution aborted: {}",
                failure
            ),
        }
        outcome
    }

    async fn run(&self, source: &DynamicObject) -> ResolutionOutcome {
        let mut pass = Pass {
            policy: self.policy,
            errors: Vec::new(),
            skipped: 0,
        };

        // Parsing
        let mut declarations: Vec<BindingDeclaration> = Vec::new();
        let annotations = source.metadata.annotations.iter().flatten();
        for parsed in parse_declarations(annotations, &self.prefix) {
            match parsed {
                Ok(declaration) => declarations.push(declaration),
                Err(error) => {
                    warn!("Invalid binding annotation: {}", error);
                    let annotation = match &error {
                        BindingError::Malformed { annotation, .. } => annotation.clone(),
                        _ => String::new(),
                    };
                    if let Some(failure) = pass.reject(&annotation, error) {
                        return ResolutionOutcome::Failed(failure);
                    }
                }
            }
        }
        debug!(
            count = declarations.len(),
            skipped = pass.skipped,
            "Parsed binding declarations"
        );

        // Dispatching
        let mut fragments: Vec<Fragment> = Vec::with_capacity(declarations.len());
        for declaration in &declarations {
            let annotation = declaration.annotation.as_str();
            let handler = match new_handler(Arc::clone(&self.client), declaration, source) {
                Ok(handler) => handler,
                Err(error @ BindingError::NoHandler { .. }) => {
                    warn!(annotation, tag = %declaration.tag, "No handler for tag, skipping");
                    pass.skip(annotation, Phase::Dispatching, error);
                    continue;
                }
                Err(error) => {
                    warn!(annotation, "Cannot bind declaration: {}", error);
                    metrics::increment_extraction_errors(error.class());
                    if let Some(failure) = pass.fail(annotation, Phase::Dispatching, error) {
                        return ResolutionOutcome::Failed(failure);
                    }
                    continue;
                }
            };

            debug!(annotation, handler = %handler.kind(), "Extracting");
            match handler.extract().await {
                Ok(fragment) => fragments.push(fragment),
                Err(error) => {
                    warn!(
                        annotation,
                        handler = %handler.kind(),
                        retryable = error.is_retryable(),
                        "Extraction failed: {}",
                        error
                    );
                    metrics::increment_extraction_errors(error.class());
                    if let Some(failure) = pass.fail(annotation, Phase::Dispatching, error) {
                        return ResolutionOutcome::Failed(failure);
                    }
                }
            }
        }

        // Merging
        let mut payload = Payload::new();
        for fragment in fragments {
            payload.merge(fragment);
        }

        ResolutionOutcome::Done(Resolution {
            payload,
            errors: pass.errors,
        })
    }
}
