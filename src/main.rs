use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use topg::config::Config;
use topg::server::{serve, AppState};
use topg::TopgEngine;

// ========================================
// MAIN ENTRY POINT
// ========================================

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::load();

    let log_level = config
        .as_ref()
        .map(|c| c.server.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let addr = config.bind_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("❌ Failed to listen on {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    let engine = TopgEngine::new(&config);
    let shutdown = CancellationToken::new();
    let dispatcher = engine
        .dispatcher(config.live.interval)
        .spawn(shutdown.clone());

    info!("🚀 TOPG GPU Server running on ws://{}", addr);
    info!("💡 Use: /gpu, /live, /stop");
    info!(
        "📦 Sampler: {} {} (timeout {}ms)",
        config.sampler.program,
        config.sampler.args.join(" "),
        config.sampler.timeout.as_millis()
    );

    let state = Arc::new(AppState {
        engine,
        server: config.server.clone(),
    });

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let result = serve(listener, state, shutdown.clone()).await;

    shutdown.cancel();
    let _ = dispatcher.await;

    match result {
        Ok(()) => {
            info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }
}
