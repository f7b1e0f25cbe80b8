//! Tinker CLI and REST API entry point.
//!
//! Binary name: `tinker`
//!
//! Parses CLI arguments, initializes tracing, then either starts the HTTP
//! server or runs a client command against one.

mod cli;
mod http;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use state::AppState;
use tinker_infra::config::{load_config, resolve_data_dir};
use tinker_observe::tracing_setup::{init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.otel, cli.log_filter())
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve {
            host,
            port,
            ephemeral,
        } => serve(host, port, ephemeral, cli.quiet).await,

        Commands::History { session, server } => {
            cli::conversation::history(&server, &session, cli.json).await
        }

        Commands::Send {
            session,
            text,
            image,
            server,
        } => cli::conversation::send(&server, &session, text, image.as_deref(), cli.json).await,
    }
}

async fn serve(
    host: Option<String>,
    port: Option<u16>,
    ephemeral: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let data_dir = resolve_data_dir();
    let config = load_config(&data_dir).await;
    let state = AppState::init(&config, &data_dir, ephemeral).await?;

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        addr = %addr,
        provider = state.orchestrator.provider_name(),
        model = %config.provider.model,
        ephemeral,
        "Tinker API listening"
    );
    if !quiet {
        println!(
            "  {} Tinker API listening on {}",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
    }

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if !quiet {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
