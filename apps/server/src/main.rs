use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use cybermitra_assist::{DirectoryService, SopGuidanceEngine};
use cybermitra_backend_runtime::{shutdown_signal, telemetry, BackendServices};
use cybermitra_config::load as load_config;
use cybermitra_database::StationRepository;
use cybermitra_gateway::{create_router, GatewayState};

#[derive(Parser)]
#[command(name = "cybermitra-backend")]
#[command(about = "Cybermitra cybercrime-assistance backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Populate the police station directory if it is empty
    SeedStations,
    /// Print the effective configuration and exit
    ConfigCheck,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::SeedStations => seed_stations().await,
        Commands::ConfigCheck => config_check(),
    }
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting Cybermitra backend");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    DirectoryService::new(StationRepository::new(services.db_pool.clone()))
        .seed_if_empty()
        .await
        .context("failed to seed the station directory")?;

    let state = GatewayState::new(
        services.db_pool.clone(),
        &config,
        services.authenticator.clone(),
        Arc::new(SopGuidanceEngine::new()),
    );
    let app = create_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn seed_stations() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let seeded = DirectoryService::new(StationRepository::new(services.db_pool))
        .seed_if_empty()
        .await
        .context("failed to seed the station directory")?;

    if seeded == 0 {
        println!("station directory already populated");
    } else {
        println!("seeded {seeded} police stations");
    }
    Ok(())
}

fn config_check() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
