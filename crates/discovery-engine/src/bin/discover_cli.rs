//! Thin CLI wrapper around `discovery_engine::discover()`: reads a `Request`
//! as JSON from a file or stdin, runs one invocation against the cluster
//! the ambient kubeconfig points at, and writes the `Response` as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use discovery_core::invocation::Request;
use discovery_resolve::KubeClusterReader;
use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "discover-cli")]
#[command(about = "Runs one Discovery Engine invocation from a JSON request")]
#[command(version)]
struct Cli {
    /// Path to a JSON-encoded Request; reads stdin when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Pretty-print the JSON response.
    #[arg(short, long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let raw = match &cli.input {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading request from stdin")?;
            buf
        }
    };

    let request: Request = serde_json::from_str(&raw).context("request is not valid JSON")?;

    let client = kube::Client::try_default().await.context("building kube client from ambient config")?;
    let cluster: Arc<dyn discovery_core::ClusterReader> = Arc::new(KubeClusterReader::new(client));

    let response = discovery_engine::discover(request, cluster).await.context("discovery invocation failed")?;

    let out = if cli.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{out}");

    Ok(())
}
