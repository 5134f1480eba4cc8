//! LTI Gateway - Entry Point
//!
//! Serves LTI launches, session endpoints and grade passback over HTTP.

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use lti_gateway::{Config, LtiGateway, server::LtiServer};

#[derive(Parser, Debug)]
#[command(name = "lti-gateway")]
#[command(about = "LTI 1.1 tool provider gateway")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Public base URL consumers launch against (e.g., https://tool.example)
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting LTI gateway");

    let config = Config::from_env()?;
    tracing::debug!(?config, "Loaded configuration");

    let gateway = LtiGateway::from_config(&config)?;
    let server = LtiServer::new(gateway);

    tracing::info!(port = cli.port, base_url = ?cli.base_url, "Running in HTTP mode");
    server.run_http(cli.port, cli.base_url).await
}
