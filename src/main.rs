use anyhow::Context;

use study_planner::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env().context("Failed to read configuration")?;

    eprintln!("📚 Study Planner v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}", config.port);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!(
        "   Suggestions: max {}, rotate tasks: {}, skip completed: {}\n",
        config.suggester.max_suggestions,
        config.suggester.rotate_tasks,
        config.suggester.skip_completed,
    );

    let db_path = config.db_path.clone();
    study_planner::server::run(config, shutdown_signal())
        .await
        .with_context(|| format!("Study planner failed (database: {})", db_path.display()))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
