//! chatrelay HTTP server
//!
//! Starts an Axum web server exposing the chat and image relay endpoints.

use chatrelay::{
    cli::{Cli, Command, generate_config_template},
    config::{Config, Credentials},
    handlers::{self, AppState},
    telemetry,
};
use clap::Parser;
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is not an error
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                eprintln!("Wrote configuration template to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    // Load configuration
    let config = Config::from_file(&cli.config)?;

    // Initialize telemetry
    telemetry::init(&config.observability.log_level);

    tracing::info!(
        "Starting chatrelay server on {}:{}",
        config.server.host,
        config.server.port
    );

    let credentials = Credentials::from_env(&config)?;

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));

    tracing::info!(
        upstream = %config.upstream.base_url,
        chat_model = %config.upstream.chat_model,
        image_model = %config.upstream.image_model,
        search_enabled = credentials.search_api_key.is_some(),
        "Upstream configured"
    );

    let state = AppState::new(config, credentials)?;
    let app = handlers::router(state);

    tracing::info!("Listening on {}", addr);
    tracing::info!("Chat endpoint available at http://{}/api/chat", addr);
    tracing::info!("Image endpoint available at http://{}/api/image", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
