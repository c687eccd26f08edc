//! Server bootstrap — opens the store, wires the suggester, serves HTTP.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::planner::{PlannerState, SlotSuggester, planner_routes};
use crate::store::{Database, LibSqlBackend};

/// Open the database at `config.db_path` and serve until `shutdown` resolves.
pub async fn run(config: ServerConfig, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    let suggester = SlotSuggester::new(Arc::clone(&db), config.suggester.clone());
    let app = planner_routes(PlannerState::new(db, suggester));

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, "Study planner server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Study planner server stopped");
    Ok(())
}
