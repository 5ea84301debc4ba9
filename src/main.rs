//! Identity Gateway - mTLS identity provider integration with PII decryption

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use identity_gateway::{
    cli::{Cli, Command},
    config::GatewayConfig,
    gateway::server::Server,
    pii, setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    // .env next to the binary's working directory, if any
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded .env");
    }

    let mut config = match GatewayConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }

    match cli.command {
        Some(Command::Decrypt { value }) => run_decrypt(&config, &value),
        Some(Command::Serve) | None => run_server(config).await,
    }
}

/// Decrypt a single field and print the plaintext
fn run_decrypt(config: &GatewayConfig, value: &str) -> ExitCode {
    let key = match config.pii_key() {
        Ok(k) => k,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    match pii::decrypt_field(value, &key, &config.aad) {
        Ok(plaintext) => {
            println!("{plaintext}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the HTTP server
async fn run_server(config: GatewayConfig) -> ExitCode {
    let server = match Server::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create server: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
