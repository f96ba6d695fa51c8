use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use admin_tools::api::api_routes;
use admin_tools::config::ServerConfig;
use admin_tools::jobs::ExecutionEngine;
use admin_tools::tools::ToolRegistry;
use admin_tools::tools::builtin::register_builtin_tools;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("invalid ADMIN_TOOLS_* configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let tools = Arc::new(ToolRegistry::new());
    register_builtin_tools(&tools).context("failed to register built-in tools")?;

    let engine = ExecutionEngine::new(Arc::clone(&tools), config.engine.clone());
    let app = api_routes(engine, config.recent_jobs_limit);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    eprintln!("🛠  Admin Tools v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Tools: {}", tools.count().await);
    eprintln!("   API: http://{}/api/tools", addr);
    eprintln!("   Max concurrent jobs: {}", config.engine.max_concurrent_jobs);

    tracing::info!(%addr, "Admin Tools server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Admin Tools server stopped");
    Ok(())
}

/// Log to stderr, and additionally to a daily rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(dir) = log_dir else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
        return None;
    };

    let appender = tracing_appender::rolling::daily(dir, "admin-tools.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer),
        )
        .init();
    Some(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
