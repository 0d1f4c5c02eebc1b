//! Run the anonymous visitor chain once and print the decision.
//!
//! Usage:
//!   flagcheck                          # configuration from GUESTFLAG_* env
//!   flagcheck -c client.yaml           # YAML overrides
//!   flagcheck --endpoint http://host:8443 --json
//!
//! Exits 0 for enabled or disabled and 2 when the decision is unknown.
use anyhow::Context;
use clap::Parser;
use guestflag_client::{ClientChain, ClientConfig, FlagDecision, HttpServices};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flagcheck")]
#[command(about = "Evaluate a guestflag feature as an anonymous visitor")]
struct Args {
    /// YAML file overriding the GUESTFLAG_* environment
    #[arg(short = 'c', long, env = "GUESTFLAG_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Control-plane base URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Whole-chain timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print the full evaluation as JSON instead of the decision
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::from_env_or_yaml(args.config.as_deref())
        .context("load client config")?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout = Duration::from_millis(timeout_ms);
    }
    config.validate()?;

    let chain = ClientChain::new(config.clone(), HttpServices::new(config.endpoint.clone()));
    if args.json {
        return match chain.run().await {
            Ok(result) => {
                println!("{}", serde_json::to_string_pretty(&result)?);
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                eprintln!("{err}");
                Ok(ExitCode::from(2))
            }
        };
    }

    let decision = chain.decide().await;
    println!("{}/{}: {decision}", config.project_name, config.feature_name);
    Ok(match decision {
        FlagDecision::Unknown => ExitCode::from(2),
        FlagDecision::Enabled | FlagDecision::Disabled => ExitCode::SUCCESS,
    })
}
