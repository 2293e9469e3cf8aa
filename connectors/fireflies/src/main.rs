use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use shared::telemetry::{self, TelemetryConfig};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use catnotes_fireflies::api::{create_router, ApiState};
use catnotes_fireflies::cli::{self, Cli, Command};
use catnotes_fireflies::{FirefliesClient, FirefliesConfig, NotesGenerator, PdfRenderer};

/// How many consecutive ports to try when the configured one is taken.
const PORT_ATTEMPTS: u16 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let telemetry_config = TelemetryConfig::from_env("catnotes");
    telemetry::init_telemetry(telemetry_config)?;

    let config = FirefliesConfig::from_env()?;
    let client = FirefliesClient::new(&config)?;
    let renderer = PdfRenderer::new(&config.output_dir).with_prefix(&config.document_prefix);
    let generator = Arc::new(NotesGenerator::new(
        Arc::new(client),
        Arc::new(renderer),
        config.poll,
        config.search_limit,
    ));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, generator).await,
        command => cli::run(command, &generator, &cli.budget).await,
    }
}

async fn serve(config: &FirefliesConfig, generator: Arc<NotesGenerator>) -> Result<()> {
    info!("Starting CatNotes");

    tokio::fs::create_dir_all(&config.output_dir).await?;
    let app = create_router(ApiState {
        generator,
        output_dir: config.output_dir.clone(),
    });

    let listener = bind(config.port).await?;
    info!("HTTP server listening on {}", listener.local_addr()?);

    if let Err(e) = axum::serve(listener, app).await {
        error!("HTTP server stopped: {:?}", e);
    }

    Ok(())
}

async fn bind(port: u16) -> Result<TcpListener> {
    let mut candidate = port;
    loop {
        let addr = SocketAddr::from(([0, 0, 0, 0], candidate));
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e)
                if e.kind() == ErrorKind::AddrInUse
                    && candidate < port.saturating_add(PORT_ATTEMPTS - 1) =>
            {
                warn!("Port {} is in use, trying {}", candidate, candidate + 1);
                candidate += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
