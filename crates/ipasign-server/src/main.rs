mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ipasign_core::models::CleanupPolicy;
use ipasign_core::pipeline::SystemRunner;
use ipasign_core::workspace::sweep_stale_workspaces;
use ipasign_server::{AppState, ServerConfig, router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ipasign_server=debug,ipasign_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::from_env().map_err(anyhow::Error::msg)?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(upload_dir) = cli.upload_dir {
        config.upload_dir = upload_dir;
    }

    match cli.command.unwrap_or_default() {
        Commands::Run => run(config).await,
        Commands::Config => {
            for (key, value) in config.describe() {
                println!("{} = {}", key, value);
            }
            Ok(())
        }
    }
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create upload directory {}",
                config.upload_dir.display()
            )
        })?;

    // Kept workspaces are for manual inspection, so only sweep when nothing is meant to survive
    if config.cleanup == CleanupPolicy::Always {
        let swept = sweep_stale_workspaces(&config.upload_dir)
            .await
            .context("Failed to sweep stale request workspaces")?;
        if swept > 0 {
            tracing::info!("Removed {} stale request workspace(s)", swept);
        }
    }

    let bind_addr = config.bind_addr;
    let runner = Arc::new(SystemRunner::new(config.command_timeout));
    let state = AppState::new(config, runner);

    let app = router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("ipasign server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("ipasign server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
