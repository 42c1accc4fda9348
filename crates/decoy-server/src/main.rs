use clap::Parser;
use decoy_server::delay::TokioDelayer;
use decoy_server::mapping::FileLoader;
use decoy_server::matching::{ScenarioHandler, ScoringMatcher};
use decoy_server::server;
use decoy_server::service::Service;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "decoy", about = "Declarative HTTP mock server")]
struct Args {
    /// Port to serve mock responses on
    #[arg(short, long, env = "DECOY_PORT", default_value = "8080")]
    port: u16,
    /// Directory holding mapping files
    #[arg(short, long, env = "DECOY_MAPPINGS", default_value = "mappings")]
    mappings: PathBuf,
    /// Directory holding response body files
    #[arg(short, long, env = "DECOY_RESPONSES", default_value = "responses")]
    responses: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let loaded = FileLoader::new().load(&args.mappings, &args.responses)?;
    let cache = Arc::new(loaded.cache);
    let service = Arc::new(Service::new(
        Arc::new(loaded.mappings),
        Arc::new(ScoringMatcher::new(Arc::clone(&cache))),
        Arc::new(ScenarioHandler::new(loaded.scenarios, cache)),
        Arc::new(TokioDelayer),
    ));

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!(port = args.port, "decoy listening");

    tokio::select! {
        result = server::serve(listener, service) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}
