//! # BINDCTL CLI
//!
//! Command-line interface for the binding engine.
//!
//! Runs single resolution passes against the cluster in the current kube context,
//! which is useful to debug binding annotations before a controller picks them up.
//!
//! ## Usage
//!
//! ```bash
//! # Show what the bindings on a resource resolve to
//! bindctl resolve example.com/v1/Database orders-db -n apps
//!
//! # Create the derived Secret as well
//! bindctl resolve example.com/v1/Database orders-db -n apps --apply
//!
//! # Compare a fixed-name Secret against the resolved payload
//! bindctl diff orders-db-credentials example.com/v1/Database orders-db -n apps
//!
//! # Remove a derived Secret
//! bindctl delete orders-db-3f1c... -n apps
//! ```

use anyhow::{Context, Result};
use binding_secret_controller::client::{KubeResourceClient, ResourceClient};
use binding_secret_controller::config::BindingConfig;
use binding_secret_controller::observability::{logging, metrics};
use clap::{Parser, Subcommand, ValueEnum};
use kube::Client;
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

mod delete;
mod diff;
mod resolve;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Binding Secret Controller CLI
#[derive(Parser)]
#[command(name = "bindctl", version = VERSION)]
#[command(
    about = "Resolve binding annotations into content-addressed Secrets",
    long_about = None,
    after_help = "\
Source kinds are given as <group>/<version>/<Kind>, e.g. example.com/v1/Database.
Core kinds use v1/<Kind>.

Examples:
  bindctl resolve example.com/v1/Database orders-db --namespace apps
  bindctl resolve example.com/v1/Database orders-db --apply --output yaml
  bindctl diff orders-db-credentials example.com/v1/Database orders-db
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to current context namespace)
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Print Prometheus metrics for the run to stderr
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the bindings of a source resource
    /// Exits with status 1 when any binding failed
    Resolve {
        /// Source kind as <group>/<version>/<Kind>
        #[arg(value_name = "KIND")]
        kind: String,

        /// Name of the source resource
        #[arg(value_name = "NAME")]
        name: String,

        /// Create the derived Secret
        #[arg(long)]
        apply: bool,

        /// Base name of the derived Secret (defaults to the source name)
        #[arg(long)]
        base_name: Option<String>,
    },
    /// Compare a fixed-name Secret against the resolved payload
    /// Exits with status 1 when they differ
    Diff {
        /// Name of the Secret to compare against
        #[arg(value_name = "SECRET")]
        secret: String,

        /// Source kind as <group>/<version>/<Kind>
        #[arg(value_name = "KIND")]
        kind: String,

        /// Name of the source resource
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Delete a derived Secret (succeeds if it is already gone)
    Delete {
        /// Name of the Secret
        #[arg(value_name = "SECRET")]
        secret: String,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Yaml,
}

/// Shared state for one command invocation
pub(crate) struct Session {
    pub client: Arc<dyn ResourceClient>,
    pub config: BindingConfig,
    pub namespace: String,
    pub output: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Configure rustls crypto provider before any TLS connection is made
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_provider| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = BindingConfig::from_env();
    logging::init_tracing(&config.log_level, config.log_enable_color)?;

    let cli = Cli::parse();
    if cli.metrics {
        metrics::register_metrics()?;
    }

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;
    let namespace = cli
        .namespace
        .unwrap_or_else(|| client.default_namespace().to_string());
    let timeout = config.request_timeout();
    let session = Session {
        client: Arc::new(KubeResourceClient::new(client)) as Arc<dyn ResourceClient>,
        config,
        namespace,
        output: cli.output,
    };

    let result = match cli.command {
        Commands::Resolve {
            kind,
            name,
            apply,
            base_name,
        } => {
            with_timeout(
                timeout,
                resolve::resolve_command(&session, &kind, &name, apply, base_name),
            )
            .await
        }
        Commands::Diff { secret, kind, name } => {
            with_timeout(timeout, diff::diff_command(&session, &secret, &kind, &name)).await
        }
        Commands::Delete { secret } => {
            with_timeout(timeout, delete::delete_command(&session, &secret)).await
        }
    };

    if cli.metrics {
        eprintln!("{}", metrics::render()?);
    }
    // Commands report false when the state they inspected is not the desired one
    Ok(if result? {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Bound a command by the configured request timeout
async fn with_timeout(timeout: Duration, command: impl Future<Output = Result<bool>>) -> Result<bool> {
    tokio::time::timeout(timeout, command)
        .await
        .with_context(|| format!("Command timed out after {}s", timeout.as_secs()))?
}
